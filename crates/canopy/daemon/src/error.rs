//! Daemon and API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use canopy_lifecycle::LifecycleError;
use serde::Serialize;
use thiserror::Error;

/// Errors raised while starting or running the daemon itself.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("unknown engine backend '{0}'")]
    UnknownBackend(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for DaemonError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type DaemonResult<T> = Result<T, DaemonError>;

/// Errors returned to API callers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("operation in flight: {0}")]
    OperationInFlight(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("engine failure: {0}")]
    Engine(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Wire shape of every error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::AlreadyExists(name) => {
                Self::AlreadyExists(format!("deployment '{name}' already exists"))
            }
            LifecycleError::NotFound(name) => {
                Self::NotFound(format!("deployment '{name}' not found"))
            }
            LifecycleError::OperationInFlight { name, running } => Self::OperationInFlight(
                format!("{running} already in flight for deployment '{name}'"),
            ),
            LifecycleError::Engine { .. } => Self::Engine(err.to_string()),
            // The site template never produces a structurally invalid
            // program; reaching this is a bug, not a caller error.
            LifecycleError::Program(source) => Self::Internal(source.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::AlreadyExists(_) => (StatusCode::CONFLICT, "ALREADY_EXISTS"),
            ApiError::OperationInFlight(_) => (StatusCode::CONFLICT, "OPERATION_IN_FLIGHT"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Engine(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ENGINE_FAILURE"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            details: None,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
