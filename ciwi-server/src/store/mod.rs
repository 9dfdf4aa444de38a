//! Store Module
//!
//! Persistence boundary of the control plane. Handlers only ever talk to the
//! `Store` trait; every method is expected to be atomic on its own.
//!
//! Two implementations ship with the server:
//! - `MemoryStore`: in-process tables, the default backend and the test fake
//! - `PgStore`: PostgreSQL through sqlx

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ciwi_core::domain::artifact::JobExecutionArtifact;
use ciwi_core::domain::event::JobExecutionEvent;
use ciwi_core::domain::job::{JobExecution, JobExecutionStatus, SERVER_CONTROL_AGENT_ID};
use ciwi_core::domain::test_report::JobExecutionTestReport;
use ciwi_core::dto::job::{CreateJobExecutionRequest, JobExecutionStatusUpdate};
use thiserror::Error;

/// Store error type
///
/// Callers classify failures with `is_not_found` and `is_lease_conflict`,
/// which also recognise the `not found` and `another agent` wording inside
/// backend messages.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job execution {0} not found")]
    NotFound(String),

    #[error("job execution {job_id} is leased by another agent ({holder})")]
    LeaseConflict { job_id: String, holder: String },

    #[error("job execution {0} already finished")]
    AlreadyFinished(String),

    #[error("job execution {job_id} is not queued (status: {status})")]
    NotQueued {
        job_id: String,
        status: JobExecutionStatus,
    },

    #[error("invalid store request: {0}")]
    Invalid(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store data error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_)) || self.to_string().contains("not found")
    }

    pub fn is_lease_conflict(&self) -> bool {
        matches!(self, StoreError::LeaseConflict { .. })
            || self.to_string().contains("another agent")
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistence capability consumed by the lifecycle handlers
#[async_trait]
pub trait Store: Send + Sync {
    /// Every job execution, newest first
    async fn list_job_executions(&self) -> Result<Vec<JobExecution>>;

    /// Creates a new `queued` job execution
    async fn create_job_execution(&self, req: CreateJobExecutionRequest) -> Result<JobExecution>;

    /// Fetches a job execution; `StoreError::NotFound` when it does not exist
    async fn get_job_execution(&self, id: &str) -> Result<JobExecution>;

    /// Deletes a job execution that is still `queued`
    async fn delete_queued_job_execution(&self, id: &str) -> Result<()>;

    /// Applies an agent or server status transition, enforcing the lease holder
    async fn update_job_execution_status(
        &self,
        id: &str,
        update: JobExecutionStatusUpdate,
    ) -> Result<JobExecution>;

    /// Appends events and merges their metadata patches into the job
    async fn append_job_execution_events(
        &self,
        id: &str,
        events: Vec<JobExecutionEvent>,
    ) -> Result<()>;

    /// Stored artifact records of a job, ordered by path
    async fn list_job_execution_artifacts(&self, id: &str) -> Result<Vec<JobExecutionArtifact>>;

    /// Upserts artifact records by path
    async fn save_job_execution_artifacts(
        &self,
        id: &str,
        artifacts: Vec<JobExecutionArtifact>,
    ) -> Result<()>;

    async fn get_job_execution_test_report(
        &self,
        id: &str,
    ) -> Result<Option<JobExecutionTestReport>>;

    /// Stores the report and refreshes the job's test summary
    async fn save_job_execution_test_report(
        &self,
        id: &str,
        report: JobExecutionTestReport,
    ) -> Result<()>;

    /// Removes every queued job execution, returning how many were removed
    async fn clear_queued_job_executions(&self) -> Result<u64>;

    /// Removes every finished job execution, returning how many were removed
    async fn flush_job_execution_history(&self) -> Result<u64>;

    /// Leases the oldest queued job whose requirements the agent satisfies
    async fn lease_job_execution(
        &self,
        agent_id: &str,
        capabilities: &BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> Result<Option<JobExecution>>;
}

// =============================================================================
// Shared Semantics
// =============================================================================

/// Applies a status transition to a loaded job
///
/// Both backends run this under their own exclusion (write lock or row lock)
/// so that the lease check and the write are one step.
pub(crate) fn apply_status_update(
    job: &mut JobExecution,
    update: &JobExecutionStatusUpdate,
) -> Result<()> {
    let holder = job.leased_by_agent_id.trim();
    if !holder.is_empty() && holder != update.agent_id {
        return Err(StoreError::LeaseConflict {
            job_id: job.id.clone(),
            holder: holder.to_string(),
        });
    }

    if job.status.is_terminal() {
        return Err(StoreError::AlreadyFinished(job.id.clone()));
    }

    if !update.status.is_valid_update() {
        return Err(StoreError::Invalid(format!(
            "status {} cannot be reported by an agent",
            update.status
        )));
    }

    let ts = update.timestamp_utc;

    if holder.is_empty() && update.agent_id != SERVER_CONTROL_AGENT_ID {
        job.leased_by_agent_id = update.agent_id.clone();
        job.leased_utc.get_or_insert(ts);
    }

    job.status = update.status;

    if update.status == JobExecutionStatus::Running && job.started_utc.is_none() {
        job.started_utc = Some(ts);
    }
    if update.status.is_terminal() {
        job.finished_utc = Some(ts);
    }

    if let Some(exit_code) = update.exit_code {
        job.exit_code = Some(exit_code);
    }
    if let Some(error) = &update.error {
        job.error = error.clone();
    }
    if let Some(output) = &update.output {
        job.output = output.clone();
    }
    if let Some(current_step) = &update.current_step {
        job.current_step = current_step.clone();
    }

    Ok(())
}

/// Requirements of a job the agent's capabilities do not satisfy
///
/// A required value of `""` only asks for the key to be present.
pub fn unmet_requirements(
    required: &BTreeMap<String, String>,
    capabilities: &BTreeMap<String, String>,
) -> Vec<String> {
    required
        .iter()
        .filter(|(key, want)| match capabilities.get(*key) {
            None => true,
            Some(have) => !want.trim().is_empty() && have.trim() != want.trim(),
        })
        .map(|(key, want)| {
            if want.trim().is_empty() {
                key.clone()
            } else {
                format!("{}={}", key, want.trim())
            }
        })
        .collect()
}

/// Builds the record a fresh job execution starts from
pub(crate) fn new_job_execution(
    id: String,
    req: CreateJobExecutionRequest,
    now: DateTime<Utc>,
) -> JobExecution {
    JobExecution {
        id,
        script: req.script,
        env: req.env,
        required_capabilities: req.required_capabilities,
        timeout_seconds: req.timeout_seconds,
        artifact_globs: req.artifact_globs,
        caches: req.caches,
        source: req.source,
        metadata: req.metadata,
        step_plan: req.step_plan,
        status: JobExecutionStatus::Queued,
        created_utc: now,
        sensitive_values: req.sensitive_values,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 16, minute, 0).unwrap()
    }

    fn build_update(agent_id: &str, status: JobExecutionStatus) -> JobExecutionStatusUpdate {
        JobExecutionStatusUpdate {
            agent_id: agent_id.to_string(),
            status,
            exit_code: None,
            error: None,
            output: None,
            current_step: None,
            timestamp_utc: ts(5),
        }
    }

    #[test]
    fn test_first_running_update_takes_lease_and_starts() {
        let mut job = JobExecution {
            id: "job-1".to_string(),
            ..Default::default()
        };

        apply_status_update(&mut job, &build_update("agent-1", JobExecutionStatus::Running))
            .unwrap();

        assert_eq!(job.status, JobExecutionStatus::Running);
        assert_eq!(job.leased_by_agent_id, "agent-1");
        assert_eq!(job.started_utc, Some(ts(5)));
        assert_eq!(job.leased_utc, Some(ts(5)));
        assert!(job.finished_utc.is_none());
    }

    #[test]
    fn test_other_agent_is_rejected_without_mutation() {
        let mut job = JobExecution {
            id: "job-1".to_string(),
            status: JobExecutionStatus::Running,
            leased_by_agent_id: "agent-1".to_string(),
            output: "line1".to_string(),
            ..Default::default()
        };
        let before = job.clone();

        let mut update = build_update("agent-2", JobExecutionStatus::Failed);
        update.output = Some("hijacked".to_string());
        let err = apply_status_update(&mut job, &update).unwrap_err();

        assert!(err.is_lease_conflict());
        assert_eq!(job, before);
    }

    #[test]
    fn test_terminal_is_absorbing() {
        let mut job = JobExecution {
            id: "job-1".to_string(),
            status: JobExecutionStatus::Succeeded,
            leased_by_agent_id: "agent-1".to_string(),
            ..Default::default()
        };

        let err = apply_status_update(&mut job, &build_update("agent-1", JobExecutionStatus::Running))
            .unwrap_err();

        assert!(matches!(err, StoreError::AlreadyFinished(_)));
        assert_eq!(job.status, JobExecutionStatus::Succeeded);
    }

    #[test]
    fn test_server_control_does_not_take_lease() {
        let mut job = JobExecution {
            id: "job-1".to_string(),
            ..Default::default()
        };

        let mut update = build_update(SERVER_CONTROL_AGENT_ID, JobExecutionStatus::Failed);
        update.error = Some("cancelled by user".to_string());
        apply_status_update(&mut job, &update).unwrap();

        assert_eq!(job.status, JobExecutionStatus::Failed);
        assert!(job.leased_by_agent_id.is_empty());
        assert!(job.started_utc.is_none());
        assert_eq!(job.finished_utc, Some(ts(5)));
        assert_eq!(job.error, "cancelled by user");
    }

    #[test]
    fn test_error_classification_by_message() {
        assert!(StoreError::NotFound("x".to_string()).is_not_found());
        assert!(StoreError::Invalid("artifact not found".to_string()).is_not_found());
        assert!(!StoreError::AlreadyFinished("x".to_string()).is_not_found());
        assert!(StoreError::Invalid("held by another agent".to_string()).is_lease_conflict());
        assert!(
            !StoreError::NotQueued {
                job_id: "x".to_string(),
                status: JobExecutionStatus::Running,
            }
            .is_not_found()
        );
    }

    #[test]
    fn test_unmet_requirements() {
        let required = BTreeMap::from([
            ("os".to_string(), "linux".to_string()),
            ("arch".to_string(), "amd64".to_string()),
            ("docker".to_string(), String::new()),
        ]);
        let capabilities = BTreeMap::from([
            ("os".to_string(), "linux".to_string()),
            ("arch".to_string(), "arm64".to_string()),
        ]);

        let unmet = unmet_requirements(&required, &capabilities);

        assert_eq!(unmet, vec!["arch=amd64".to_string(), "docker".to_string()]);
    }
}
