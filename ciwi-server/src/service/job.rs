//! Job Service
//!
//! Business logic for the job execution lifecycle: listing views, deletion,
//! cancel, rerun, agent status reports, artifact and test report uploads.

use std::collections::BTreeMap;

use ciwi_core::domain::artifact::JobExecutionArtifact;
use ciwi_core::domain::job::{JobExecution, JobExecutionStatus, SERVER_CONTROL_AGENT_ID};
use ciwi_core::domain::test_report::JobExecutionTestReport;
use ciwi_core::dto::artifact::UploadArtifact;
use ciwi_core::dto::job::{
    CreateJobExecutionRequest, JobExecutionStatusUpdate, UpdateJobExecutionStatusRequest,
};
use ciwi_core::dto::view::{
    BlockedByView, JobExecutionListView, JobExecutionPageView, JobExecutionSummaryView,
};
use serde::Serialize;
use thiserror::Error;

use crate::service::artifacts::{self, ArtifactError};
use crate::service::{blocked_by, display};
use crate::state::AppState;
use crate::store::StoreError;

pub const CANCEL_ERROR: &str = "cancelled by user";
pub const CANCEL_OUTPUT_MARKER: &str = "[control] job cancelled by user";

/// Service error type
///
/// The variants carry the HTTP classification; `Store` and `Artifact` are
/// classified by the API layer from the underlying error.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job execution {0} not found")]
    NotFound(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

// =============================================================================
// Listing
// =============================================================================

/// Shape of the `/jobs` listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListView {
    Full,
    Summary,
    Queued,
    History,
}

impl ListView {
    pub fn parse(raw: Option<&str>) -> Result<Self, JobError> {
        match raw.map(str::trim).unwrap_or("") {
            "" => Ok(ListView::Full),
            "summary" => Ok(ListView::Summary),
            "queued" => Ok(ListView::Queued),
            "history" => Ok(ListView::History),
            other => Err(JobError::InvalidRequest(format!("invalid view {:?}", other))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ListView::Full => "",
            ListView::Summary => "summary",
            ListView::Queued => "queued",
            ListView::History => "history",
        }
    }
}

/// Clamped listing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery {
    pub view: ListView,
    pub max: usize,
    pub offset: usize,
    pub limit: usize,
}

impl ListQuery {
    /// Builds a query from raw query-string values, clamping numbers into range
    pub fn from_params(
        view: Option<&str>,
        max: Option<&str>,
        offset: Option<&str>,
        limit: Option<&str>,
    ) -> Result<Self, JobError> {
        Ok(Self {
            view: ListView::parse(view)?,
            max: display::clamp_max(max),
            offset: display::clamp_offset(offset),
            limit: display::clamp_limit(limit),
        })
    }
}

/// Any of the three listing responses
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JobListing {
    Full(JobExecutionListView),
    Summary(JobExecutionSummaryView),
    Page(JobExecutionPageView),
}

/// Lists job executions in the requested view
pub async fn list_job_executions(state: &AppState, query: ListQuery) -> Result<JobListing, JobError> {
    let mut jobs = state.store.list_job_executions().await?;

    let listing = match query.view {
        ListView::Full => {
            state.hooks.enrich_list(&mut jobs);
            JobListing::Full(JobExecutionListView {
                job_executions: jobs,
            })
        }
        ListView::Summary => {
            let capped = display::cap_display_jobs(&jobs, query.max);
            let (queued, history) = display::split_by_state(&capped);
            JobListing::Summary(JobExecutionSummaryView {
                view: query.view.as_str().to_string(),
                max: query.max,
                total: capped.len(),
                queued_count: queued.len(),
                history_count: history.len(),
                queued_groups: display::summarize_display_groups(&queued),
                history_groups: display::summarize_display_groups(&history),
            })
        }
        ListView::Queued | ListView::History => {
            let capped = display::cap_display_jobs(&jobs, query.max);
            let (queued, history) = display::split_by_state(&capped);
            let side = if query.view == ListView::Queued {
                queued
            } else {
                history
            };

            let mut page = display::paginate(&side, query.offset, query.limit);
            state.hooks.enrich_list(&mut page);
            JobListing::Page(JobExecutionPageView {
                view: query.view.as_str().to_string(),
                max: query.max,
                total: side.len(),
                offset: query.offset,
                limit: query.limit,
                job_executions: page,
            })
        }
    };

    Ok(listing)
}

// =============================================================================
// Single Job Operations
// =============================================================================

async fn fetch_job(state: &AppState, id: &str) -> Result<JobExecution, JobError> {
    state.store.get_job_execution(id).await.map_err(|err| {
        if err.is_not_found() {
            JobError::NotFound(id.to_string())
        } else {
            JobError::Store(err)
        }
    })
}

/// Get a job by ID, with the single-job enrichers applied
pub async fn get_job_execution(state: &AppState, id: &str) -> Result<JobExecution, JobError> {
    let mut job = fetch_job(state, id).await?;
    state.hooks.enrich_one(&mut job);
    Ok(job)
}

/// Delete a job that is still queued
pub async fn delete_job_execution(state: &AppState, id: &str) -> Result<(), JobError> {
    state
        .store
        .delete_queued_job_execution(id)
        .await
        .map_err(|err| {
            if err.is_not_found() {
                JobError::NotFound(id.to_string())
            } else {
                JobError::Conflict(err.to_string())
            }
        })?;

    tracing::info!("Job execution deleted: {}", id);
    remove_job_artifacts(state, id).await;
    Ok(())
}

/// Output of a cancelled job: the existing output plus the control marker line
pub fn cancelled_output(output: &str) -> String {
    if output.is_empty() {
        CANCEL_OUTPUT_MARKER.to_string()
    } else {
        format!("{}\n{}", output, CANCEL_OUTPUT_MARKER)
    }
}

/// Cancel an active job
///
/// The transition is reported under the lease holder's identity so the
/// lease check passes; an unleased job is failed as `server-control`.
pub async fn cancel_job_execution(state: &AppState, id: &str) -> Result<JobExecution, JobError> {
    let job = fetch_job(state, id).await?;

    if !job.is_active() {
        return Err(JobError::Conflict(format!(
            "job execution {} is not active (status: {})",
            id, job.status
        )));
    }

    let agent_id = if job.is_leased() {
        job.leased_by_agent_id.trim().to_string()
    } else {
        SERVER_CONTROL_AGENT_ID.to_string()
    };

    let update = JobExecutionStatusUpdate {
        agent_id,
        status: JobExecutionStatus::Failed,
        exit_code: None,
        error: Some(CANCEL_ERROR.to_string()),
        output: Some(cancelled_output(&job.output)),
        current_step: None,
        timestamp_utc: state.hooks.now_utc(),
    };

    let updated = state
        .store
        .update_job_execution_status(id, update)
        .await
        .map_err(|err| JobError::InvalidRequest(err.to_string()))?;

    tracing::info!(
        "Job execution {} cancelled (lease holder: {})",
        id,
        if job.is_leased() { job.leased_by_agent_id.as_str() } else { "none" }
    );
    state.hooks.job_updated(&updated);

    Ok(updated)
}

/// Create request that runs the same configuration as `job` again
pub fn rerun_request(job: &JobExecution) -> CreateJobExecutionRequest {
    CreateJobExecutionRequest {
        script: job.script.clone(),
        env: job.env.clone(),
        required_capabilities: job.required_capabilities.clone(),
        timeout_seconds: job.timeout_seconds,
        artifact_globs: job.artifact_globs.clone(),
        caches: job.caches.clone(),
        source: job.source.clone(),
        metadata: job.metadata.clone(),
        step_plan: job.step_plan.clone(),
        sensitive_values: Vec::new(),
    }
}

/// Rerun a job that has started at least once, as a fresh queued job
pub async fn rerun_job_execution(state: &AppState, id: &str) -> Result<JobExecution, JobError> {
    let job = fetch_job(state, id).await?;

    if !job.has_started() {
        return Err(JobError::Conflict(format!(
            "job execution {} has not started yet",
            id
        )));
    }

    let rerun = state
        .store
        .create_job_execution(rerun_request(&job))
        .await
        .map_err(|err| JobError::InvalidRequest(err.to_string()))?;

    tracing::info!("Job execution {} rerun as {}", id, rerun.id);
    Ok(rerun)
}

/// Apply a status report from an agent
pub async fn update_job_execution_status(
    state: &AppState,
    id: &str,
    req: UpdateJobExecutionStatusRequest,
) -> Result<JobExecution, JobError> {
    let agent_id = req.agent_id.trim().to_string();
    if agent_id.is_empty() {
        return Err(JobError::InvalidRequest("agent_id is required".to_string()));
    }

    let status = JobExecutionStatus::parse_update(&req.status).ok_or_else(|| {
        JobError::InvalidRequest(format!(
            "status must be one of running, succeeded, failed (got {:?})",
            req.status
        ))
    })?;

    let timestamp_utc = req.timestamp_utc.unwrap_or_else(|| state.hooks.now_utc());
    let update = JobExecutionStatusUpdate {
        agent_id: agent_id.clone(),
        status,
        exit_code: req.exit_code,
        error: req.error,
        output: req.output,
        current_step: req.current_step,
        timestamp_utc,
    };

    let job = state
        .store
        .update_job_execution_status(id, update)
        .await
        .map_err(|err| {
            if err.is_lease_conflict() {
                JobError::Conflict(err.to_string())
            } else {
                JobError::InvalidRequest(err.to_string())
            }
        })?;

    if !req.events.is_empty() {
        if let Err(err) = state.store.append_job_execution_events(id, req.events).await {
            tracing::debug!("Ignoring event append failure for {}: {}", id, err);
        }
    }

    state.hooks.agent_seen(&agent_id, timestamp_utc);
    state.hooks.job_updated(&job);

    if status == JobExecutionStatus::Running
        && !job.current_step.trim().is_empty()
        && job.output.is_empty()
    {
        tracing::warn!(
            "Agent {} reports step {:?} on job {} without any output",
            agent_id,
            job.current_step,
            id
        );
    }
    if status.is_terminal() {
        tracing::info!(
            "Job execution {} finished with status {} (agent: {}, exit code: {:?})",
            id,
            status,
            agent_id,
            job.exit_code
        );
    }

    Ok(job)
}

/// Dependency that cancelled a job, if any
pub async fn blocked_by(state: &AppState, id: &str) -> Result<BlockedByView, JobError> {
    let job = fetch_job(state, id).await?;
    let all_jobs = state.store.list_job_executions().await?;
    Ok(blocked_by::analyze_blocked_by(&job, &all_jobs))
}

// =============================================================================
// Artifacts and Test Reports
// =============================================================================

fn require_agent_id(agent_id: &str) -> Result<String, JobError> {
    let agent_id = agent_id.trim();
    if agent_id.is_empty() {
        return Err(JobError::InvalidRequest("agent_id is required".to_string()));
    }
    Ok(agent_id.to_string())
}

/// Fetches a job an agent wants to write to, enforcing its lease
async fn fetch_for_agent(state: &AppState, id: &str, agent_id: &str) -> Result<JobExecution, JobError> {
    let job = fetch_job(state, id).await?;
    if job.is_leased() && job.leased_by_agent_id.trim() != agent_id {
        return Err(JobError::Conflict(format!(
            "job execution {} is leased by another agent",
            id
        )));
    }
    Ok(job)
}

/// Stored artifacts plus the synthetic report entries, with public URLs
pub async fn list_artifacts(state: &AppState, id: &str) -> Result<Vec<JobExecutionArtifact>, JobError> {
    fetch_job(state, id).await?;
    let stored = state.store.list_job_execution_artifacts(id).await?;
    let mut listed = state.artifacts.with_synthetic_reports(id, stored).await;
    for artifact in &mut listed {
        artifact.url = artifacts::public_url(&artifact.url);
    }
    Ok(listed)
}

/// Stored artifacts plus the synthetic report entries, with stored URLs
pub async fn bundle_candidates(
    state: &AppState,
    id: &str,
) -> Result<Vec<JobExecutionArtifact>, JobError> {
    fetch_job(state, id).await?;
    let stored = state.store.list_job_execution_artifacts(id).await?;
    Ok(state.artifacts.with_synthetic_reports(id, stored).await)
}

/// Persist JSON-uploaded artifacts for the agent holding the job
pub async fn upload_artifacts(
    state: &AppState,
    id: &str,
    agent_id: &str,
    uploads: &[UploadArtifact],
) -> Result<Vec<JobExecutionArtifact>, JobError> {
    let agent_id = require_agent_id(agent_id)?;
    fetch_for_agent(state, id, &agent_id).await?;

    let persisted = state.artifacts.persist_artifacts(id, uploads).await?;
    save_artifacts(state, id, &agent_id, persisted).await
}

/// Persist the entries of a ZIP upload for the agent holding the job
pub async fn upload_artifacts_zip(
    state: &AppState,
    id: &str,
    agent_id: &str,
    archive: axum::body::Bytes,
) -> Result<Vec<JobExecutionArtifact>, JobError> {
    let agent_id = require_agent_id(agent_id)?;
    fetch_for_agent(state, id, &agent_id).await?;

    let limit = state.artifacts.max_expanded_bytes();
    let files = tokio::task::spawn_blocking(move || artifacts::extract_zip_upload(&archive, limit))
        .await
        .map_err(ArtifactError::from)??;
    let persisted = state.artifacts.persist_files(id, files).await?;
    save_artifacts(state, id, &agent_id, persisted).await
}

async fn save_artifacts(
    state: &AppState,
    id: &str,
    agent_id: &str,
    mut persisted: Vec<JobExecutionArtifact>,
) -> Result<Vec<JobExecutionArtifact>, JobError> {
    state
        .store
        .save_job_execution_artifacts(id, persisted.clone())
        .await?;

    tracing::info!(
        "Agent {} uploaded {} artifact(s) for job {}",
        agent_id,
        persisted.len(),
        id
    );

    for artifact in &mut persisted {
        artifact.url = artifacts::public_url(&artifact.url);
    }
    state.hooks.agent_seen(agent_id, state.hooks.now_utc());
    Ok(persisted)
}

pub async fn get_test_report(
    state: &AppState,
    id: &str,
) -> Result<Option<JobExecutionTestReport>, JobError> {
    fetch_job(state, id).await?;
    Ok(state.store.get_job_execution_test_report(id).await?)
}

/// Store a test report and materialize its report files
pub async fn upload_test_report(
    state: &AppState,
    id: &str,
    agent_id: &str,
    report: JobExecutionTestReport,
) -> Result<JobExecutionTestReport, JobError> {
    let agent_id = require_agent_id(agent_id)?;
    fetch_for_agent(state, id, &agent_id).await?;

    state
        .store
        .save_job_execution_test_report(id, report.clone())
        .await?;
    state.artifacts.persist_test_report(id, &report).await?;
    state.artifacts.persist_coverage_report(id, &report).await?;

    tracing::info!(
        "Agent {} uploaded test report for job {} ({} passed, {} failed, {} skipped)",
        agent_id,
        id,
        report.passed,
        report.failed,
        report.skipped
    );
    state.hooks.agent_seen(&agent_id, state.hooks.now_utc());

    Ok(report)
}

// =============================================================================
// Bulk Administration
// =============================================================================

pub async fn clear_queue(state: &AppState) -> Result<u64, JobError> {
    let candidates = job_ids_where(state, |job| job.status == JobExecutionStatus::Queued).await?;
    let cleared = state.store.clear_queued_job_executions().await?;
    tracing::info!("Cleared {} queued job execution(s)", cleared);

    remove_orphaned_artifacts(state, candidates).await;
    Ok(cleared)
}

pub async fn flush_history(state: &AppState) -> Result<u64, JobError> {
    let candidates = job_ids_where(state, |job| job.status.is_terminal()).await?;
    let flushed = state.store.flush_job_execution_history().await?;
    tracing::info!("Flushed {} finished job execution(s)", flushed);

    remove_orphaned_artifacts(state, candidates).await;
    Ok(flushed)
}

async fn job_ids_where(
    state: &AppState,
    keep: impl Fn(&JobExecution) -> bool,
) -> Result<Vec<String>, JobError> {
    let jobs = state.store.list_job_executions().await?;
    Ok(jobs.into_iter().filter(|job| keep(job)).map(|job| job.id).collect())
}

/// Removes the artifact directories of candidates the store no longer has
///
/// A candidate that changed state between listing and removal is still
/// stored, so its files are kept.
async fn remove_orphaned_artifacts(state: &AppState, candidates: Vec<String>) {
    for id in candidates {
        match state.store.get_job_execution(&id).await {
            Err(err) if err.is_not_found() => remove_job_artifacts(state, &id).await,
            Err(err) => tracing::warn!("Keeping artifacts of job {}: {}", id, err),
            Ok(_) => {}
        }
    }
}

async fn remove_job_artifacts(state: &AppState, id: &str) {
    if let Err(err) = state.artifacts.remove_job_dir(id).await {
        tracing::warn!("Failed to remove artifacts of job {}: {}", id, err);
    }
}

// =============================================================================
// Agent Leasing
// =============================================================================

/// Lease the oldest queued job the agent can run
pub async fn lease_job_execution(
    state: &AppState,
    agent_id: &str,
    capabilities: &BTreeMap<String, String>,
) -> Result<Option<JobExecution>, JobError> {
    let agent_id = require_agent_id(agent_id)?;
    let now = state.hooks.now_utc();

    let leased = state
        .store
        .lease_job_execution(&agent_id, capabilities, now)
        .await?;
    state.hooks.agent_seen(&agent_id, now);

    match &leased {
        Some(job) => {
            tracing::info!("Job execution {} leased by agent {}", job.id, agent_id);
            state.hooks.job_updated(job);
        }
        None => tracing::debug!("No job available for agent {}", agent_id),
    }

    Ok(leased)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, TimeZone, Utc};

    use crate::hooks::Hooks;
    use crate::service::artifacts::ArtifactStore;
    use crate::store::MemoryStore;

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 16, minute, 0).unwrap()
    }

    fn test_state(jobs: Vec<JobExecution>) -> AppState {
        AppState::new(
            Arc::new(MemoryStore::with_jobs(jobs)),
            ArtifactStore::new(std::env::temp_dir().join("ciwi-service-tests")),
        )
        .with_hooks(Hooks {
            now: Some(Arc::new(|| ts(45))),
            ..Default::default()
        })
    }

    fn running_job() -> JobExecution {
        JobExecution {
            id: "job-1".to_string(),
            script: "make test".to_string(),
            status: JobExecutionStatus::Running,
            leased_by_agent_id: "agent-1".to_string(),
            started_utc: Some(ts(31)),
            output: "line1".to_string(),
            created_utc: ts(30),
            ..Default::default()
        }
    }

    fn status_request(agent_id: &str, status: &str) -> UpdateJobExecutionStatusRequest {
        UpdateJobExecutionStatusRequest {
            agent_id: agent_id.to_string(),
            status: status.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_cancelled_output() {
        assert_eq!(cancelled_output(""), CANCEL_OUTPUT_MARKER);
        assert_eq!(
            cancelled_output("line1"),
            "line1\n[control] job cancelled by user"
        );
    }

    #[test]
    fn test_list_view_parse() {
        assert_eq!(ListView::parse(None).unwrap(), ListView::Full);
        assert_eq!(ListView::parse(Some("history")).unwrap(), ListView::History);
        assert!(ListView::parse(Some("everything")).is_err());
    }

    #[test]
    fn test_rerun_request_copies_configuration() {
        let mut job = running_job();
        job.env = BTreeMap::from([("GOFLAGS".to_string(), "-mod=mod".to_string())]);
        job.metadata = BTreeMap::from([("pipeline_id".to_string(), "build".to_string())]);
        job.timeout_seconds = 600;
        job.sensitive_values = vec!["secret".to_string()];

        let req = rerun_request(&job);

        assert_eq!(req.script, "make test");
        assert_eq!(req.env, job.env);
        assert_eq!(req.metadata, job.metadata);
        assert_eq!(req.timeout_seconds, 600);
        assert!(req.sensitive_values.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_uses_lease_holder() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorded = seen.clone();
        let state = test_state(vec![running_job()]).with_hooks(Hooks {
            now: Some(Arc::new(|| ts(45))),
            on_job_updated: Some(Arc::new(move |job: &JobExecution| {
                recorded.lock().unwrap().push(job.id.clone());
            })),
            ..Default::default()
        });

        let job = cancel_job_execution(&state, "job-1").await.unwrap();

        assert_eq!(job.status, JobExecutionStatus::Failed);
        assert_eq!(job.error, CANCEL_ERROR);
        assert_eq!(job.output, "line1\n[control] job cancelled by user");
        assert_eq!(job.leased_by_agent_id, "agent-1");
        assert_eq!(job.finished_utc, Some(ts(45)));
        assert_eq!(*seen.lock().unwrap(), vec!["job-1".to_string()]);
    }

    #[tokio::test]
    async fn test_cancel_queued_job_as_server_control() {
        let queued = JobExecution {
            id: "job-q".to_string(),
            script: "true".to_string(),
            ..Default::default()
        };
        let state = test_state(vec![queued]);

        let job = cancel_job_execution(&state, "job-q").await.unwrap();

        assert_eq!(job.status, JobExecutionStatus::Failed);
        assert!(job.leased_by_agent_id.is_empty());
        assert_eq!(job.output, CANCEL_OUTPUT_MARKER);
    }

    #[tokio::test]
    async fn test_cancel_finished_job_conflicts() {
        let mut finished = running_job();
        finished.status = JobExecutionStatus::Succeeded;
        let state = test_state(vec![finished]);

        let err = cancel_job_execution(&state, "job-1").await.unwrap_err();
        assert!(matches!(err, JobError::Conflict(_)));

        let job = get_job_execution(&state, "job-1").await.unwrap();
        assert_eq!(job.status, JobExecutionStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_rerun_requires_started_job() {
        let mut queued = running_job();
        queued.status = JobExecutionStatus::Queued;
        queued.started_utc = None;
        queued.leased_by_agent_id.clear();
        let state = test_state(vec![queued]);

        let err = rerun_job_execution(&state, "job-1").await.unwrap_err();
        assert!(matches!(err, JobError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_rerun_creates_fresh_queued_job() {
        let state = test_state(vec![running_job()]);

        let rerun = rerun_job_execution(&state, "job-1").await.unwrap();

        assert_ne!(rerun.id, "job-1");
        assert_eq!(rerun.status, JobExecutionStatus::Queued);
        assert_eq!(rerun.script, "make test");
        let source = get_job_execution(&state, "job-1").await.unwrap();
        assert_eq!(source.status, JobExecutionStatus::Running);
    }

    #[tokio::test]
    async fn test_status_update_validation() {
        let state = test_state(vec![running_job()]);

        let err = update_job_execution_status(&state, "job-1", status_request(" ", "running"))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidRequest(_)));

        let err = update_job_execution_status(&state, "job-1", status_request("agent-1", "queued"))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidRequest(_)));

        let err = update_job_execution_status(&state, "job-1", status_request("agent-2", "failed"))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_status_update_marks_agent_seen() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorded = seen.clone();
        let state = test_state(vec![running_job()]).with_hooks(Hooks {
            now: Some(Arc::new(|| ts(45))),
            mark_agent_seen: Some(Arc::new(move |agent: &str, at: DateTime<Utc>| {
                recorded.lock().unwrap().push((agent.to_string(), at));
            })),
            ..Default::default()
        });

        let mut req = status_request("agent-1", "succeeded");
        req.exit_code = Some(0);
        let job = update_job_execution_status(&state, "job-1", req).await.unwrap();

        assert_eq!(job.status, JobExecutionStatus::Succeeded);
        assert_eq!(job.exit_code, Some(0));
        assert_eq!(*seen.lock().unwrap(), vec![("agent-1".to_string(), ts(45))]);
    }

    #[tokio::test]
    async fn test_missing_job_is_not_found() {
        let state = test_state(Vec::new());
        let err = get_job_execution(&state, "nope").await.unwrap_err();
        assert!(matches!(err, JobError::NotFound(_)));

        let err = delete_job_execution(&state, "nope").await.unwrap_err();
        assert!(matches!(err, JobError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_flush_history_removes_artifact_dirs() {
        let root = tempfile::tempdir().unwrap();
        let mut finished = running_job();
        finished.status = JobExecutionStatus::Succeeded;
        let queued = JobExecution {
            id: "job-q".to_string(),
            script: "true".to_string(),
            ..Default::default()
        };
        let state = AppState::new(
            Arc::new(MemoryStore::with_jobs(vec![finished, queued])),
            ArtifactStore::new(root.path()),
        );
        for id in ["job-1", "job-q"] {
            state
                .artifacts
                .persist_files(id, vec![("out.txt".to_string(), b"x".to_vec())])
                .await
                .unwrap();
        }

        assert_eq!(flush_history(&state).await.unwrap(), 1);
        assert!(!root.path().join("job-1").exists());
        assert!(root.path().join("job-q/out.txt").exists());

        assert_eq!(clear_queue(&state).await.unwrap(), 1);
        assert!(!root.path().join("job-q").exists());
    }

    #[tokio::test]
    async fn test_delete_running_job_conflicts() {
        let state = test_state(vec![running_job()]);
        let err = delete_job_execution(&state, "job-1").await.unwrap_err();
        assert!(matches!(err, JobError::Conflict(_)));
    }
}
