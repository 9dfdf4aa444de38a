//! In-memory Store
//!
//! Keeps every table in process behind one `RwLock`. Used when no database is
//! configured and as the backing store of the test suite.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ciwi_core::domain::artifact::JobExecutionArtifact;
use ciwi_core::domain::event::{JobExecutionEvent, apply_metadata_patch};
use ciwi_core::domain::job::{JobExecution, JobExecutionStatus};
use ciwi_core::domain::test_report::JobExecutionTestReport;
use ciwi_core::dto::job::{CreateJobExecutionRequest, JobExecutionStatusUpdate};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    Result, Store, StoreError, apply_status_update, new_job_execution, unmet_requirements,
};

#[derive(Default)]
struct Tables {
    jobs: Vec<JobExecution>,
    artifacts: HashMap<String, Vec<JobExecutionArtifact>>,
    reports: HashMap<String, JobExecutionTestReport>,
    events: HashMap<String, Vec<JobExecutionEvent>>,
}

impl Tables {
    fn job(&self, id: &str) -> Result<&JobExecution> {
        self.jobs
            .iter()
            .find(|job| job.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn job_mut(&mut self, id: &str) -> Result<&mut JobExecution> {
        self.jobs
            .iter_mut()
            .find(|job| job.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Drops every job matching `predicate` together with its child records
    fn remove_where(&mut self, predicate: impl Fn(&JobExecution) -> bool) -> u64 {
        let (removed, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.jobs).into_iter().partition(predicate);
        self.jobs = kept;

        for job in &removed {
            self.artifacts.remove(&job.id);
            self.reports.remove(&job.id);
            self.events.remove(&job.id);
        }

        removed.len() as u64
    }
}

/// Store implementation holding all state in memory
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with job executions
    pub fn with_jobs(jobs: Vec<JobExecution>) -> Self {
        Self {
            tables: RwLock::new(Tables {
                jobs,
                ..Default::default()
            }),
        }
    }

    /// Inserts or replaces a job execution as-is
    pub async fn insert_job(&self, job: JobExecution) {
        let mut tables = self.tables.write().await;
        match tables.jobs.iter_mut().find(|existing| existing.id == job.id) {
            Some(existing) => *existing = job,
            None => tables.jobs.push(job),
        }
    }

    /// Events appended for a job, oldest first
    pub async fn events(&self, id: &str) -> Vec<JobExecutionEvent> {
        self.tables
            .read()
            .await
            .events
            .get(id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_job_executions(&self) -> Result<Vec<JobExecution>> {
        let mut jobs = self.tables.read().await.jobs.clone();
        jobs.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(jobs)
    }

    async fn create_job_execution(&self, req: CreateJobExecutionRequest) -> Result<JobExecution> {
        if req.script.trim().is_empty() {
            return Err(StoreError::Invalid("script is required".to_string()));
        }

        let job = new_job_execution(Uuid::new_v4().to_string(), req, Utc::now());
        self.tables.write().await.jobs.push(job.clone());

        Ok(job)
    }

    async fn get_job_execution(&self, id: &str) -> Result<JobExecution> {
        self.tables.read().await.job(id).cloned()
    }

    async fn delete_queued_job_execution(&self, id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let status = tables.job(id)?.status;
        if status != JobExecutionStatus::Queued {
            return Err(StoreError::NotQueued {
                job_id: id.to_string(),
                status,
            });
        }

        tables.remove_where(|job| job.id == id);
        Ok(())
    }

    async fn update_job_execution_status(
        &self,
        id: &str,
        update: JobExecutionStatusUpdate,
    ) -> Result<JobExecution> {
        let mut tables = self.tables.write().await;
        let job = tables.job_mut(id)?;

        // Work on a copy so a rejected update leaves the stored job untouched
        let mut updated = job.clone();
        apply_status_update(&mut updated, &update)?;
        *job = updated.clone();

        Ok(updated)
    }

    async fn append_job_execution_events(
        &self,
        id: &str,
        events: Vec<JobExecutionEvent>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let job = tables.job_mut(id)?;

        for event in &events {
            if let Some(patch) = &event.metadata {
                apply_metadata_patch(&mut job.metadata, patch);
            }
        }

        tables
            .events
            .entry(id.to_string())
            .or_default()
            .extend(events);

        Ok(())
    }

    async fn list_job_execution_artifacts(&self, id: &str) -> Result<Vec<JobExecutionArtifact>> {
        let tables = self.tables.read().await;
        tables.job(id)?;

        let mut artifacts = tables.artifacts.get(id).cloned().unwrap_or_default();
        artifacts.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(artifacts)
    }

    async fn save_job_execution_artifacts(
        &self,
        id: &str,
        artifacts: Vec<JobExecutionArtifact>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.job(id)?;

        let stored = tables.artifacts.entry(id.to_string()).or_default();
        for mut artifact in artifacts {
            artifact.job_execution_id = id.to_string();
            match stored.iter_mut().find(|existing| existing.path == artifact.path) {
                Some(existing) => *existing = artifact,
                None => stored.push(artifact),
            }
        }

        Ok(())
    }

    async fn get_job_execution_test_report(
        &self,
        id: &str,
    ) -> Result<Option<JobExecutionTestReport>> {
        let tables = self.tables.read().await;
        tables.job(id)?;
        Ok(tables.reports.get(id).cloned())
    }

    async fn save_job_execution_test_report(
        &self,
        id: &str,
        report: JobExecutionTestReport,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.job_mut(id)?.test_summary = Some(report.summary());
        tables.reports.insert(id.to_string(), report);
        Ok(())
    }

    async fn clear_queued_job_executions(&self) -> Result<u64> {
        let mut tables = self.tables.write().await;
        Ok(tables.remove_where(|job| job.status == JobExecutionStatus::Queued))
    }

    async fn flush_job_execution_history(&self) -> Result<u64> {
        let mut tables = self.tables.write().await;
        Ok(tables.remove_where(|job| job.status.is_terminal()))
    }

    async fn lease_job_execution(
        &self,
        agent_id: &str,
        capabilities: &BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> Result<Option<JobExecution>> {
        let mut tables = self.tables.write().await;

        let candidate = tables
            .jobs
            .iter_mut()
            .filter(|job| job.status == JobExecutionStatus::Queued)
            .filter(|job| unmet_requirements(&job.required_capabilities, capabilities).is_empty())
            .min_by(|a, b| a.created_utc.cmp(&b.created_utc));

        let Some(job) = candidate else {
            return Ok(None);
        };

        job.status = JobExecutionStatus::Leased;
        job.leased_by_agent_id = agent_id.to_string();
        job.leased_utc = Some(now);

        Ok(Some(job.clone()))
    }
}
