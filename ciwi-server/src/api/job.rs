//! Job API Handlers
//!
//! Everything below `/api/v1/jobs/{id}`. The wildcard route hands its tail
//! to `parse_job_route` and `dispatch` selects the handler, answering 405
//! for methods outside each handler's table.

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode},
    response::Response,
};
use ciwi_core::dto::job::UpdateJobExecutionStatusRequest;
use ciwi_core::dto::view::{DeleteJobExecutionView, JobExecutionView};

use crate::api::error::{ApiError, ApiResult};
use crate::api::route::{JobResource, parse_job_route};
use crate::api::{artifacts, response, test_report};
use crate::service::job_service;
use crate::state::AppState;

/// ANY /api/v1/jobs/{*rest}
pub async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    Path(rest): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let route = parse_job_route(&rest).ok_or_else(|| ApiError::NotFound("not found".to_string()))?;
    let id = route.job_id.as_str();

    match route.resource {
        None => match method {
            Method::GET => get_job(&state, id).await,
            Method::DELETE => delete_job(&state, id).await,
            _ => Err(ApiError::MethodNotAllowed),
        },
        Some(JobResource::Cancel) => match method {
            Method::POST => cancel_job(&state, id).await,
            _ => Err(ApiError::MethodNotAllowed),
        },
        Some(JobResource::Rerun) => match method {
            Method::POST => rerun_job(&state, id).await,
            _ => Err(ApiError::MethodNotAllowed),
        },
        Some(JobResource::Status) => match method {
            Method::POST => update_status(&state, id, &body).await,
            _ => Err(ApiError::MethodNotAllowed),
        },
        Some(JobResource::BlockedBy) => match method {
            Method::GET => blocked_by(&state, id).await,
            _ => Err(ApiError::MethodNotAllowed),
        },
        Some(JobResource::Tests) => test_report::handle(&state, method, id, &body).await,
        Some(JobResource::Artifacts) => match route.artifact_action {
            None => artifacts::handle(&state, method, id, &body).await,
            Some(action) => {
                artifacts::handle_action(&state, method, id, action, &params, &headers, body).await
            }
        },
    }
}

/// GET /api/v1/jobs/{id}
async fn get_job(state: &AppState, id: &str) -> ApiResult<Response> {
    tracing::debug!("Getting job execution: {}", id);

    let job_execution = job_service::get_job_execution(state, id).await?;
    response::ok(&JobExecutionView { job_execution })
}

/// DELETE /api/v1/jobs/{id}
async fn delete_job(state: &AppState, id: &str) -> ApiResult<Response> {
    job_service::delete_job_execution(state, id).await?;
    response::ok(&DeleteJobExecutionView {
        deleted: true,
        job_execution_id: id.to_string(),
    })
}

/// POST /api/v1/jobs/{id}/cancel
async fn cancel_job(state: &AppState, id: &str) -> ApiResult<Response> {
    let job_execution = job_service::cancel_job_execution(state, id).await?;
    response::ok(&JobExecutionView { job_execution })
}

/// POST /api/v1/jobs/{id}/rerun
async fn rerun_job(state: &AppState, id: &str) -> ApiResult<Response> {
    let job_execution = job_service::rerun_job_execution(state, id).await?;
    response::json(StatusCode::CREATED, &JobExecutionView { job_execution })
}

/// POST /api/v1/jobs/{id}/status
async fn update_status(state: &AppState, id: &str, body: &Bytes) -> ApiResult<Response> {
    let req: UpdateJobExecutionStatusRequest = response::decode_json(body)?;
    tracing::debug!(
        "Status report for {} from agent {}: {}",
        id,
        req.agent_id,
        req.status
    );

    let job_execution = job_service::update_job_execution_status(state, id, req).await?;
    response::ok(&JobExecutionView { job_execution })
}

/// GET /api/v1/jobs/{id}/blocked-by
async fn blocked_by(state: &AppState, id: &str) -> ApiResult<Response> {
    let view = job_service::blocked_by(state, id).await?;
    response::ok(&view)
}
