//! Shared helpers for the HTTP-level tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, Bytes},
    http::{HeaderMap, Request, StatusCode},
};
use chrono::{DateTime, TimeZone, Utc};
use ciwi_core::domain::job::{JobExecution, JobExecutionStatus};
use ciwi_server::{
    api, hooks::Hooks, service::artifacts::ArtifactStore, state::AppState, store::MemoryStore,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub root: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub fn ts(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 16, minute, 0).unwrap()
}

pub fn test_app(jobs: Vec<JobExecution>) -> TestApp {
    test_app_with_hooks(jobs, Hooks::default())
}

pub fn test_app_with_hooks(jobs: Vec<JobExecution>, hooks: Hooks) -> TestApp {
    let root = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryStore::with_jobs(jobs));
    let artifacts = ArtifactStore::new(root.path()).with_max_expanded_bytes(MAX_UPLOAD_BYTES as u64);
    let state = AppState::new(store.clone(), artifacts).with_hooks(hooks);
    let router = api::create_router(state, MAX_UPLOAD_BYTES);

    TestApp {
        router,
        store,
        root,
    }
}

pub fn build_job(id: &str, status: JobExecutionStatus, minute: u32) -> JobExecution {
    JobExecution {
        id: id.to_string(),
        script: "echo hi".to_string(),
        status,
        created_utc: ts(minute),
        ..Default::default()
    }
}

pub fn with_metadata(mut job: JobExecution, metadata: &[(&str, &str)]) -> JobExecution {
    job.metadata = metadata
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect::<BTreeMap<_, _>>();
    job
}

/// A running job leased by `agent`
pub fn leased_job(id: &str, agent: &str, minute: u32) -> JobExecution {
    JobExecution {
        leased_by_agent_id: agent.to_string(),
        leased_utc: Some(ts(minute)),
        started_utc: Some(ts(minute)),
        ..build_job(id, JobExecutionStatus::Running, minute)
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn request(&self, method: &str, uri: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request("GET", uri).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> TestResponse {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}
