//! Test Report API Handlers

use axum::{body::Bytes, http::Method, response::Response};
use ciwi_core::dto::test_report::{JobExecutionTestReportView, UploadTestReportRequest};

use crate::api::error::{ApiError, ApiResult};
use crate::api::response;
use crate::service::job_service;
use crate::state::AppState;

/// GET|POST /api/v1/jobs/{id}/tests
pub async fn handle(state: &AppState, method: Method, id: &str, body: &Bytes) -> ApiResult<Response> {
    match method {
        Method::GET => {
            tracing::debug!("Getting test report of job execution: {}", id);
            let report = job_service::get_test_report(state, id).await?;
            response::ok(&JobExecutionTestReportView { report })
        }
        Method::POST => {
            let req: UploadTestReportRequest = response::decode_json(body)?;
            let report =
                job_service::upload_test_report(state, id, &req.agent_id, req.report).await?;
            response::ok(&JobExecutionTestReportView {
                report: Some(report),
            })
        }
        _ => Err(ApiError::MethodNotAllowed),
    }
}
