//! Health Check API Handler

use axum::{http::StatusCode, response::IntoResponse};

/// GET /health
/// Liveness probe; answers `OK` without touching the store
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
