use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::casework::{CaseworkError, CatalogError};
use crate::workflows::directory::DirectoryError;
use crate::workflows::scheduling::SchedulingError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use std::fmt;

/// Caller-facing classification shared by every workflow error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Business-rule violation the user can correct.
    Validation,
    NotFound,
    /// A storage-level race was lost; retry with a fresh search.
    Conflict,
    /// Unknown or empty visa-type/requirement catalog entry.
    Configuration,
    UploadNotAllowed,
    Internal,
}

impl ErrorKind {
    pub const fn label(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Configuration => "configuration",
            ErrorKind::UploadNotAllowed => "upload_not_allowed",
            ErrorKind::Internal => "internal",
        }
    }

    pub const fn status(self) -> StatusCode {
        match self {
            ErrorKind::Validation | ErrorKind::Configuration | ErrorKind::UploadNotAllowed => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error body used by the workflow routers.
pub fn error_response(kind: ErrorKind, message: String) -> Response {
    let body = Json(json!({ "error": message, "kind": kind }));
    (kind.status(), body).into_response()
}

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Catalog(CatalogError),
    Directory(DirectoryError),
    Scheduling(SchedulingError),
    Casework(CaseworkError),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Catalog(err) => err.kind(),
            AppError::Directory(err) => err.kind(),
            AppError::Scheduling(err) => err.kind(),
            AppError::Casework(err) => err.kind(),
            AppError::Config(_) | AppError::Telemetry(_) | AppError::Io(_) => ErrorKind::Internal,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Catalog(err) => write!(f, "catalog error: {}", err),
            AppError::Directory(err) => write!(f, "directory error: {}", err),
            AppError::Scheduling(err) => write!(f, "scheduling error: {}", err),
            AppError::Casework(err) => write!(f, "casework error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Catalog(err) => Some(err),
            AppError::Directory(err) => Some(err),
            AppError::Scheduling(err) => Some(err),
            AppError::Casework(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        error_response(kind, self.to_string())
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<CatalogError> for AppError {
    fn from(value: CatalogError) -> Self {
        Self::Catalog(value)
    }
}

impl From<DirectoryError> for AppError {
    fn from(value: DirectoryError) -> Self {
        Self::Directory(value)
    }
}

impl From<SchedulingError> for AppError {
    fn from(value: SchedulingError) -> Self {
        Self::Scheduling(value)
    }
}

impl From<CaseworkError> for AppError {
    fn from(value: CaseworkError) -> Self {
        Self::Casework(value)
    }
}
