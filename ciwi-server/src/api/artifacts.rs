//! Artifact API Handlers
//!
//! Listing and uploading artifacts of a job, and streaming them back as a
//! ZIP archive.

use std::collections::HashMap;

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use ciwi_core::dto::artifact::{JobExecutionArtifactsView, UploadArtifactsRequest};
use futures::StreamExt;
use tokio_util::io::ReaderStream;

use crate::api::error::{ApiError, ApiResult};
use crate::api::response;
use crate::api::route::ArtifactAction;
use crate::service::artifacts::{self, ZipBundle};
use crate::service::job_service;
use crate::state::AppState;

/// Header carrying the uploading agent on raw ZIP uploads
pub const AGENT_ID_HEADER: &str = "X-CIWI-Agent-ID";

/// GET|POST /api/v1/jobs/{id}/artifacts
pub async fn handle(state: &AppState, method: Method, id: &str, body: &Bytes) -> ApiResult<Response> {
    match method {
        Method::GET => {
            tracing::debug!("Listing artifacts of job execution: {}", id);
            let artifacts = job_service::list_artifacts(state, id).await?;
            response::ok(&JobExecutionArtifactsView { artifacts })
        }
        Method::POST => {
            let req: UploadArtifactsRequest = response::decode_json(body)?;
            let artifacts =
                job_service::upload_artifacts(state, id, &req.agent_id, &req.artifacts).await?;
            response::ok(&JobExecutionArtifactsView { artifacts })
        }
        _ => Err(ApiError::MethodNotAllowed),
    }
}

/// /api/v1/jobs/{id}/artifacts/{upload-zip|download|download-all}
pub async fn handle_action(
    state: &AppState,
    method: Method,
    id: &str,
    action: ArtifactAction,
    params: &HashMap<String, String>,
    headers: &HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    match (action, method) {
        (ArtifactAction::UploadZip, Method::POST) => {
            let agent_id = headers
                .get(AGENT_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("");
            let artifacts = job_service::upload_artifacts_zip(state, id, agent_id, body).await?;
            response::ok(&JobExecutionArtifactsView { artifacts })
        }
        (ArtifactAction::Download, Method::GET) => {
            let prefix = match params.get("prefix").map(|p| p.trim()).filter(|p| !p.is_empty()) {
                Some(raw) => Some(
                    artifacts::normalize_artifact_path(raw)
                        .ok_or_else(|| ApiError::BadRequest(format!("invalid prefix {:?}", raw)))?,
                ),
                None => None,
            };
            download(state, id, prefix.as_deref()).await
        }
        (ArtifactAction::DownloadAll, Method::GET) => download(state, id, None).await,
        _ => Err(ApiError::MethodNotAllowed),
    }
}

async fn download(state: &AppState, id: &str, prefix: Option<&str>) -> ApiResult<Response> {
    let candidates = job_service::bundle_candidates(state, id).await?;
    let bundle = state
        .artifacts
        .build_zip_bundle(id, &candidates, prefix)
        .await?;

    tracing::debug!(
        "Streaming {} artifact(s) of job execution {} (prefix: {:?})",
        bundle.entries.len(),
        id,
        prefix
    );

    let filename = artifacts::zip_filename(id, prefix);
    Ok(zip_response(bundle, &filename))
}

/// Streams a bundle; the temp file lives until the body is dropped
fn zip_response(bundle: ZipBundle, filename: &str) -> Response {
    let ZipBundle {
        file, temp_path, ..
    } = bundle;

    let stream = ReaderStream::new(tokio::fs::File::from_std(file)).map(move |chunk| {
        let _ = &temp_path;
        chunk
    });

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/zip")),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}
