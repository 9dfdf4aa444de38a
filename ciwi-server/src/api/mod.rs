//! API Module
//!
//! HTTP API layer of the control plane.
//! Each submodule handles endpoints for a specific resource.

pub mod agent;
pub mod artifacts;
pub mod error;
pub mod health;
pub mod job;
pub mod jobs;
pub mod response;
pub mod route;
pub mod test_report;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{any, get, post},
};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::state::AppState;

/// Create the main API router with all endpoints
///
/// # Arguments
/// * `state` - Store, artifact root and hooks shared by the handlers
/// * `max_upload_bytes` - Largest accepted request body
pub fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    let artifacts = ServeDir::new(state.artifacts.root());

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Job collection endpoints
        .route(
            "/api/v1/jobs",
            get(jobs::list_jobs).fallback(jobs::method_not_allowed),
        )
        .route(
            "/api/v1/jobs/clear-queue",
            post(jobs::clear_queue).fallback(jobs::method_not_allowed),
        )
        .route(
            "/api/v1/jobs/flush-history",
            post(jobs::flush_history).fallback(jobs::method_not_allowed),
        )
        // Single job endpoints
        .route("/api/v1/jobs/{*rest}", any(job::dispatch))
        // Agent endpoints
        .route(
            "/api/v1/agent/lease",
            post(agent::lease_job).fallback(jobs::method_not_allowed),
        )
        .route(
            "/api/v1/agents",
            get(agent::list_agents).fallback(jobs::method_not_allowed),
        )
        // Stored artifact files
        .nest_service("/artifacts", artifacts)
        // Add state and middleware
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}
