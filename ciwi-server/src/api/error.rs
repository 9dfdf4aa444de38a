//! API Error Handling
//!
//! Unified error type and conversion for API responses. Errors are written
//! as `text/plain` bodies.

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::service::artifacts::ArtifactError;
use crate::service::job::JobError;
use crate::store::StoreError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    MethodNotAllowed,
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "method not allowed".to_string(),
            ),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{}\n", message),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        if err.is_not_found() {
            ApiError::NotFound(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NotFound(id) => ApiError::NotFound(format!("job execution {} not found", id)),
            JobError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            JobError::Conflict(msg) => ApiError::Conflict(msg),
            JobError::Store(err) => err.into(),
            JobError::Artifact(err) if err.is_client_error() => ApiError::BadRequest(err.to_string()),
            JobError::Artifact(err) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<ArtifactError> for ApiError {
    fn from(err: ArtifactError) -> Self {
        JobError::from(err).into()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
