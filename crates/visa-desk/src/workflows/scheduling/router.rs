use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Deserialize;

use super::domain::AppointmentId;
use super::repository::AppointmentRepository;
use super::service::{SchedulingError, SchedulingService};
use crate::error::error_response;
use crate::workflows::directory::{AgentId, ApplicantId, DirectoryRepository};

#[derive(Debug, Deserialize)]
pub struct BookingRequest {
    pub applicant_id: String,
    pub start: DateTime<FixedOffset>,
}

#[derive(Debug, Deserialize)]
pub struct ReprogramRequest {
    pub start: DateTime<FixedOffset>,
}

#[derive(Debug, Deserialize)]
pub struct AgendaQuery {
    pub date: NaiveDate,
}

/// Router builder exposing booking and lifecycle endpoints.
pub fn scheduling_router<S>(service: Arc<SchedulingService<S>>) -> Router
where
    S: AppointmentRepository + DirectoryRepository + 'static,
{
    Router::new()
        .route("/api/v1/appointments", post(book_handler::<S>))
        .route(
            "/api/v1/appointments/:appointment_id",
            get(show_handler::<S>)
                .put(reprogram_handler::<S>)
                .delete(cancel_handler::<S>),
        )
        .route(
            "/api/v1/appointments/:appointment_id/complete",
            post(complete_handler::<S>),
        )
        .route(
            "/api/v1/appointments/:appointment_id/fail",
            post(fail_handler::<S>),
        )
        .route(
            "/api/v1/agents/:agent_id/agenda",
            get(agenda_handler::<S>),
        )
        .with_state(service)
}

impl IntoResponse for SchedulingError {
    fn into_response(self) -> Response {
        error_response(self.kind(), self.to_string())
    }
}

pub(crate) async fn book_handler<S>(
    State(service): State<Arc<SchedulingService<S>>>,
    Json(request): Json<BookingRequest>,
) -> Response
where
    S: AppointmentRepository + DirectoryRepository + 'static,
{
    let applicant = ApplicantId(request.applicant_id);
    match service.allocate(&applicant, request.start) {
        Ok(appointment) => (StatusCode::CREATED, Json(appointment.view())).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn show_handler<S>(
    State(service): State<Arc<SchedulingService<S>>>,
    Path(appointment_id): Path<String>,
) -> Response
where
    S: AppointmentRepository + DirectoryRepository + 'static,
{
    match service.appointment(&AppointmentId(appointment_id)) {
        Ok(appointment) => (StatusCode::OK, Json(appointment.view())).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn cancel_handler<S>(
    State(service): State<Arc<SchedulingService<S>>>,
    Path(appointment_id): Path<String>,
) -> Response
where
    S: AppointmentRepository + DirectoryRepository + 'static,
{
    match service.cancel(&AppointmentId(appointment_id)) {
        Ok(appointment) => (StatusCode::OK, Json(appointment.view())).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn reprogram_handler<S>(
    State(service): State<Arc<SchedulingService<S>>>,
    Path(appointment_id): Path<String>,
    Json(request): Json<ReprogramRequest>,
) -> Response
where
    S: AppointmentRepository + DirectoryRepository + 'static,
{
    match service.reprogram(&AppointmentId(appointment_id), request.start) {
        Ok(appointment) => (StatusCode::OK, Json(appointment.view())).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn complete_handler<S>(
    State(service): State<Arc<SchedulingService<S>>>,
    Path(appointment_id): Path<String>,
) -> Response
where
    S: AppointmentRepository + DirectoryRepository + 'static,
{
    match service.mark_successful(&AppointmentId(appointment_id)) {
        Ok(appointment) => (StatusCode::OK, Json(appointment.view())).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn fail_handler<S>(
    State(service): State<Arc<SchedulingService<S>>>,
    Path(appointment_id): Path<String>,
) -> Response
where
    S: AppointmentRepository + DirectoryRepository + 'static,
{
    match service.mark_failed(&AppointmentId(appointment_id)) {
        Ok(appointment) => (StatusCode::OK, Json(appointment.view())).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn agenda_handler<S>(
    State(service): State<Arc<SchedulingService<S>>>,
    Path(agent_id): Path<String>,
    Query(query): Query<AgendaQuery>,
) -> Response
where
    S: AppointmentRepository + DirectoryRepository + 'static,
{
    match service.agenda(&AgentId(agent_id), query.date) {
        Ok(appointments) => {
            let views: Vec<_> = appointments.iter().map(|appointment| appointment.view()).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(err) => err.into_response(),
    }
}
