//! Agent API Handlers
//!
//! HTTP endpoints agents use to pick up work, plus the presence table.

use axum::{body::Bytes, extract::State, response::Response};
use ciwi_core::dto::agent::{AgentsView, LeaseJobRequest, LeaseJobResponse};

use crate::api::error::ApiResult;
use crate::api::response;
use crate::service::job_service;
use crate::state::AppState;

/// POST /api/v1/agent/lease
/// Lease the oldest queued job the agent's capabilities satisfy
pub async fn lease_job(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let req: LeaseJobRequest = response::decode_json(&body)?;
    tracing::debug!("Lease request from agent {}", req.agent_id);

    let job_execution =
        job_service::lease_job_execution(&state, &req.agent_id, &req.capabilities).await?;

    response::ok(&LeaseJobResponse {
        assigned: job_execution.is_some(),
        job_execution,
    })
}

/// GET /api/v1/agents
/// Agents that have contacted the server, most recently seen first
pub async fn list_agents(State(state): State<AppState>) -> ApiResult<Response> {
    response::ok(&AgentsView {
        agents: state.agents.list(),
    })
}
