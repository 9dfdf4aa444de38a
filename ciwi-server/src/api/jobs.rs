//! Job Listing API Handlers
//!
//! HTTP endpoints on the `/api/v1/jobs` collection: listing views and the
//! bulk administration actions.

use axum::{
    extract::{Query, State},
    response::Response,
};
use ciwi_core::dto::view::{ClearQueueView, FlushHistoryView};
use serde::Deserialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::response;
use crate::service::job_service::{self, ListQuery};
use crate::state::AppState;

/// Raw listing parameters; numbers are clamped, not validated
#[derive(Debug, Default, Deserialize)]
pub struct ListJobsQuery {
    pub view: Option<String>,
    pub max: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
}

/// GET /api/v1/jobs
/// List job executions
///
/// Query parameters:
/// - `view` (optional): `summary`, `queued` or `history`; the full list when unset
/// - `max` (optional): display cap for the grouped views, default 150
/// - `offset`, `limit` (optional): paging of the `queued` and `history` views
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<ListJobsQuery>,
) -> ApiResult<Response> {
    let query = ListQuery::from_params(
        params.view.as_deref(),
        params.max.as_deref(),
        params.offset.as_deref(),
        params.limit.as_deref(),
    )?;
    tracing::debug!("Listing job executions: {:?}", query);

    let listing = job_service::list_job_executions(&state, query).await?;
    response::ok(&listing)
}

/// POST /api/v1/jobs/clear-queue
/// Remove every queued job execution
pub async fn clear_queue(State(state): State<AppState>) -> ApiResult<Response> {
    let cleared = job_service::clear_queue(&state)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    response::ok(&ClearQueueView { cleared })
}

/// POST /api/v1/jobs/flush-history
/// Remove every finished job execution
pub async fn flush_history(State(state): State<AppState>) -> ApiResult<Response> {
    let flushed = job_service::flush_history(&state)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    response::ok(&FlushHistoryView { flushed })
}

/// Fallback for methods outside a route's table
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
