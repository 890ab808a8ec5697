use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::blob::BlobStore;
use super::catalog::RequirementCatalog;
use super::domain::{DocumentId, FinalOutcome, RequirementId};
use super::notify::Notifier;
use super::repository::CaseRepository;
use super::service::{CaseworkError, CaseworkService};
use crate::error::error_response;
use crate::workflows::directory::{ApplicantId, DirectoryRepository};
use crate::workflows::scheduling::{AppointmentId, AppointmentRepository};

/// Either `appointment_id` (assign the visa type's catalog) or `code` (one ad-hoc requirement).
#[derive(Debug, Deserialize)]
pub struct AssignmentRequest {
    #[serde(default)]
    pub appointment_id: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: String,
}

#[derive(Debug, Deserialize)]
pub struct RejectionRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct FinalResultRequest {
    pub outcome: FinalOutcome,
    #[serde(default)]
    pub reason: Option<String>,
}

type Shared<S, K, B, N> = State<Arc<CaseworkService<S, K, B, N>>>;

/// Router builder exposing requirement, document and folder endpoints.
pub fn casework_router<S, K, B, N>(service: Arc<CaseworkService<S, K, B, N>>) -> Router
where
    S: CaseRepository + DirectoryRepository + AppointmentRepository + 'static,
    K: RequirementCatalog + 'static,
    B: BlobStore + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/catalog/visa-types/:code",
            get(visa_requirements_handler::<S, K, B, N>),
        )
        .route(
            "/api/v1/applicants/:applicant_id/requirements",
            get(list_requirements_handler::<S, K, B, N>).post(assign_handler::<S, K, B, N>),
        )
        .route(
            "/api/v1/requirements/:requirement_id",
            get(upload_status_handler::<S, K, B, N>).delete(remove_handler::<S, K, B, N>),
        )
        .route(
            "/api/v1/requirements/:requirement_id/documents",
            get(versions_handler::<S, K, B, N>).post(upload_handler::<S, K, B, N>),
        )
        .route(
            "/api/v1/documents/:document_id/content",
            get(download_handler::<S, K, B, N>),
        )
        .route(
            "/api/v1/documents/:document_id/approve",
            post(approve_handler::<S, K, B, N>),
        )
        .route(
            "/api/v1/documents/:document_id/reject",
            post(reject_handler::<S, K, B, N>),
        )
        .route(
            "/api/v1/applicants/:applicant_id/folder",
            get(folder_handler::<S, K, B, N>),
        )
        .route(
            "/api/v1/applicants/:applicant_id/folder/result",
            post(final_result_handler::<S, K, B, N>),
        )
        .with_state(service)
}

impl IntoResponse for CaseworkError {
    fn into_response(self) -> Response {
        error_response(self.kind(), self.to_string())
    }
}

fn respond<T: serde::Serialize>(status: StatusCode, result: Result<T, CaseworkError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn visa_requirements_handler<S, K, B, N>(
    State(service): Shared<S, K, B, N>,
    Path(code): Path<String>,
) -> Response
where
    S: CaseRepository + DirectoryRepository + AppointmentRepository + 'static,
    K: RequirementCatalog + 'static,
    B: BlobStore + 'static,
    N: Notifier + 'static,
{
    respond(StatusCode::OK, service.visa_requirements(&code))
}

pub(crate) async fn list_requirements_handler<S, K, B, N>(
    State(service): Shared<S, K, B, N>,
    Path(applicant_id): Path<String>,
) -> Response
where
    S: CaseRepository + DirectoryRepository + AppointmentRepository + 'static,
    K: RequirementCatalog + 'static,
    B: BlobStore + 'static,
    N: Notifier + 'static,
{
    respond(StatusCode::OK, service.requirements(&ApplicantId(applicant_id)))
}

pub(crate) async fn assign_handler<S, K, B, N>(
    State(service): Shared<S, K, B, N>,
    Path(applicant_id): Path<String>,
    Json(request): Json<AssignmentRequest>,
) -> Response
where
    S: CaseRepository + DirectoryRepository + AppointmentRepository + 'static,
    K: RequirementCatalog + 'static,
    B: BlobStore + 'static,
    N: Notifier + 'static,
{
    let applicant = ApplicantId(applicant_id);
    let result = match (request.appointment_id, request.code) {
        (Some(appointment), _) => {
            service.assign_from_catalog(&applicant, &AppointmentId(appointment))
        }
        (None, Some(code)) => service.add_requirement(&applicant, &code).map(|r| vec![r]),
        (None, None) => Err(CaseworkError::MissingField("appointment_id or code")),
    };
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn upload_status_handler<S, K, B, N>(
    State(service): Shared<S, K, B, N>,
    Path(requirement_id): Path<String>,
) -> Response
where
    S: CaseRepository + DirectoryRepository + AppointmentRepository + 'static,
    K: RequirementCatalog + 'static,
    B: BlobStore + 'static,
    N: Notifier + 'static,
{
    let id = RequirementId(requirement_id);
    let result = service.requirement(&id).and_then(|requirement| {
        let upload = service.upload_status(&id)?;
        Ok(json!({ "requirement": requirement, "upload": upload }))
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn remove_handler<S, K, B, N>(
    State(service): Shared<S, K, B, N>,
    Path(requirement_id): Path<String>,
) -> Response
where
    S: CaseRepository + DirectoryRepository + AppointmentRepository + 'static,
    K: RequirementCatalog + 'static,
    B: BlobStore + 'static,
    N: Notifier + 'static,
{
    respond(
        StatusCode::OK,
        service.remove_requirement(&RequirementId(requirement_id)),
    )
}

pub(crate) async fn versions_handler<S, K, B, N>(
    State(service): Shared<S, K, B, N>,
    Path(requirement_id): Path<String>,
) -> Response
where
    S: CaseRepository + DirectoryRepository + AppointmentRepository + 'static,
    K: RequirementCatalog + 'static,
    B: BlobStore + 'static,
    N: Notifier + 'static,
{
    respond(StatusCode::OK, service.versions(&RequirementId(requirement_id)))
}

pub(crate) async fn upload_handler<S, K, B, N>(
    State(service): Shared<S, K, B, N>,
    Path(requirement_id): Path<String>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Response
where
    S: CaseRepository + DirectoryRepository + AppointmentRepository + 'static,
    K: RequirementCatalog + 'static,
    B: BlobStore + 'static,
    N: Notifier + 'static,
{
    respond(
        StatusCode::CREATED,
        service.upload(&RequirementId(requirement_id), &query.filename, &body),
    )
}

pub(crate) async fn download_handler<S, K, B, N>(
    State(service): Shared<S, K, B, N>,
    Path(document_id): Path<String>,
) -> Response
where
    S: CaseRepository + DirectoryRepository + AppointmentRepository + 'static,
    K: RequirementCatalog + 'static,
    B: BlobStore + 'static,
    N: Notifier + 'static,
{
    match service.read_document(&DocumentId(document_id)) {
        Ok((version, bytes)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, version.content_type)],
            bytes,
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn approve_handler<S, K, B, N>(
    State(service): Shared<S, K, B, N>,
    Path(document_id): Path<String>,
) -> Response
where
    S: CaseRepository + DirectoryRepository + AppointmentRepository + 'static,
    K: RequirementCatalog + 'static,
    B: BlobStore + 'static,
    N: Notifier + 'static,
{
    respond(StatusCode::OK, service.approve(&DocumentId(document_id)))
}

pub(crate) async fn reject_handler<S, K, B, N>(
    State(service): Shared<S, K, B, N>,
    Path(document_id): Path<String>,
    Json(request): Json<RejectionRequest>,
) -> Response
where
    S: CaseRepository + DirectoryRepository + AppointmentRepository + 'static,
    K: RequirementCatalog + 'static,
    B: BlobStore + 'static,
    N: Notifier + 'static,
{
    respond(
        StatusCode::OK,
        service.reject(&DocumentId(document_id), &request.reason),
    )
}

pub(crate) async fn folder_handler<S, K, B, N>(
    State(service): Shared<S, K, B, N>,
    Path(applicant_id): Path<String>,
) -> Response
where
    S: CaseRepository + DirectoryRepository + AppointmentRepository + 'static,
    K: RequirementCatalog + 'static,
    B: BlobStore + 'static,
    N: Notifier + 'static,
{
    respond(
        StatusCode::OK,
        service.folder_summary(&ApplicantId(applicant_id)),
    )
}

pub(crate) async fn final_result_handler<S, K, B, N>(
    State(service): Shared<S, K, B, N>,
    Path(applicant_id): Path<String>,
    Json(request): Json<FinalResultRequest>,
) -> Response
where
    S: CaseRepository + DirectoryRepository + AppointmentRepository + 'static,
    K: RequirementCatalog + 'static,
    B: BlobStore + 'static,
    N: Notifier + 'static,
{
    let applicant = ApplicantId(applicant_id);
    let result = service
        .record_final_result(&applicant, request.outcome, request.reason.as_deref())
        .and_then(|_| service.folder_summary(&applicant));
    respond(StatusCode::OK, result)
}
