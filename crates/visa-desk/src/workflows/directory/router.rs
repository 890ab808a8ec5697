use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use super::domain::{AgentId, ApplicantId, NewApplicant};
use super::repository::DirectoryRepository;
use super::service::{DirectoryError, DirectoryService};
use crate::error::error_response;
use crate::workflows::casework::catalog::RequirementCatalog;

#[derive(Debug, Deserialize)]
pub struct VisaTypeRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct AgentRequest {
    pub name: String,
}

type Shared<S, K> = State<Arc<DirectoryService<S, K>>>;

/// Router builder for applicant intake and agent administration.
pub fn directory_router<S, K>(service: Arc<DirectoryService<S, K>>) -> Router
where
    S: DirectoryRepository + 'static,
    K: RequirementCatalog + 'static,
{
    Router::new()
        .route("/api/v1/applicants", post(register_applicant_handler::<S, K>))
        .route(
            "/api/v1/applicants/:applicant_id",
            get(applicant_handler::<S, K>),
        )
        .route(
            "/api/v1/applicants/:applicant_id/visa-type",
            put(visa_type_handler::<S, K>),
        )
        .route(
            "/api/v1/agents",
            get(agents_handler::<S, K>).post(register_agent_handler::<S, K>),
        )
        .route(
            "/api/v1/agents/:agent_id/activate",
            post(activate_handler::<S, K>),
        )
        .route(
            "/api/v1/agents/:agent_id/deactivate",
            post(deactivate_handler::<S, K>),
        )
        .with_state(service)
}

impl IntoResponse for DirectoryError {
    fn into_response(self) -> Response {
        error_response(self.kind(), self.to_string())
    }
}

fn respond<T: serde::Serialize>(status: StatusCode, result: Result<T, DirectoryError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn register_applicant_handler<S, K>(
    State(service): Shared<S, K>,
    Json(intake): Json<NewApplicant>,
) -> Response
where
    S: DirectoryRepository + 'static,
    K: RequirementCatalog + 'static,
{
    respond(StatusCode::CREATED, service.register_applicant(intake))
}

pub(crate) async fn applicant_handler<S, K>(
    State(service): Shared<S, K>,
    Path(applicant_id): Path<String>,
) -> Response
where
    S: DirectoryRepository + 'static,
    K: RequirementCatalog + 'static,
{
    respond(StatusCode::OK, service.applicant(&ApplicantId(applicant_id)))
}

pub(crate) async fn visa_type_handler<S, K>(
    State(service): Shared<S, K>,
    Path(applicant_id): Path<String>,
    Json(request): Json<VisaTypeRequest>,
) -> Response
where
    S: DirectoryRepository + 'static,
    K: RequirementCatalog + 'static,
{
    respond(
        StatusCode::OK,
        service.assign_visa_type(&ApplicantId(applicant_id), &request.code),
    )
}

pub(crate) async fn agents_handler<S, K>(State(service): Shared<S, K>) -> Response
where
    S: DirectoryRepository + 'static,
    K: RequirementCatalog + 'static,
{
    respond(StatusCode::OK, service.active_agents())
}

pub(crate) async fn register_agent_handler<S, K>(
    State(service): Shared<S, K>,
    Json(request): Json<AgentRequest>,
) -> Response
where
    S: DirectoryRepository + 'static,
    K: RequirementCatalog + 'static,
{
    respond(StatusCode::CREATED, service.register_agent(&request.name))
}

pub(crate) async fn activate_handler<S, K>(
    State(service): Shared<S, K>,
    Path(agent_id): Path<String>,
) -> Response
where
    S: DirectoryRepository + 'static,
    K: RequirementCatalog + 'static,
{
    respond(StatusCode::OK, service.activate_agent(&AgentId(agent_id)))
}

pub(crate) async fn deactivate_handler<S, K>(
    State(service): Shared<S, K>,
    Path(agent_id): Path<String>,
) -> Response
where
    S: DirectoryRepository + 'static,
    K: RequirementCatalog + 'static,
{
    respond(StatusCode::OK, service.deactivate_agent(&AgentId(agent_id)))
}
