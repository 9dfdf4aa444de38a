//! PostgreSQL Store
//!
//! Handles all database operations for job executions, their artifacts,
//! test reports and events. Map and list attributes are stored as JSONB.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ciwi_core::domain::artifact::JobExecutionArtifact;
use ciwi_core::domain::event::{JobExecutionEvent, apply_metadata_patch};
use ciwi_core::domain::job::{
    JobCacheSpec, JobExecution, JobExecutionStatus, JobExecutionTestSummary, JobStepPlanItem,
    SourceSpec,
};
use ciwi_core::domain::test_report::JobExecutionTestReport;
use ciwi_core::dto::job::{CreateJobExecutionRequest, JobExecutionStatusUpdate};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use super::{
    Result, Store, StoreError, apply_status_update, new_job_execution, unmet_requirements,
};

const JOB_COLUMNS: &str = r#"
    id, script, env, required_capabilities, timeout_seconds, artifact_globs, caches,
    source, metadata, step_plan, current_step, status, created_utc, started_utc,
    finished_utc, leased_utc, leased_by_agent_id, exit_code, error, output,
    test_summary, sensitive_values
"#;

/// Store implementation backed by PostgreSQL
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_for_update(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: &str,
    ) -> Result<JobExecution> {
        let sql = format!(
            "SELECT {} FROM job_executions WHERE id = $1 FOR UPDATE",
            JOB_COLUMNS
        );
        let row = sqlx::query_as::<_, JobExecutionRow>(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        row.try_into()
    }

    async fn write_state(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        job: &JobExecution,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE job_executions
            SET status = $2, started_utc = $3, finished_utc = $4, leased_utc = $5,
                leased_by_agent_id = $6, exit_code = $7, error = $8, output = $9,
                current_step = $10
            WHERE id = $1
            "#,
        )
        .bind(&job.id)
        .bind(job.status.as_str())
        .bind(job.started_utc)
        .bind(job.finished_utc)
        .bind(job.leased_utc)
        .bind(&job.leased_by_agent_id)
        .bind(job.exit_code)
        .bind(&job.error)
        .bind(&job.output)
        .bind(&job.current_step)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn ensure_exists(&self, id: &str) -> Result<()> {
        let exists: Option<(String,)> =
            sqlx::query_as("SELECT id FROM job_executions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        exists
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn list_job_executions(&self) -> Result<Vec<JobExecution>> {
        let sql = format!(
            "SELECT {} FROM job_executions ORDER BY created_utc DESC, id DESC",
            JOB_COLUMNS
        );
        let rows = sqlx::query_as::<_, JobExecutionRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(JobExecution::try_from).collect()
    }

    async fn create_job_execution(&self, req: CreateJobExecutionRequest) -> Result<JobExecution> {
        if req.script.trim().is_empty() {
            return Err(StoreError::Invalid("script is required".to_string()));
        }

        let job = new_job_execution(Uuid::new_v4().to_string(), req, Utc::now());

        sqlx::query(
            r#"
            INSERT INTO job_executions (
                id, script, env, required_capabilities, timeout_seconds, artifact_globs,
                caches, source, metadata, step_plan, status, created_utc, sensitive_values
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(&job.id)
        .bind(&job.script)
        .bind(Json(&job.env))
        .bind(Json(&job.required_capabilities))
        .bind(i64::try_from(job.timeout_seconds).unwrap_or(i64::MAX))
        .bind(Json(&job.artifact_globs))
        .bind(Json(&job.caches))
        .bind(job.source.as_ref().map(Json))
        .bind(Json(&job.metadata))
        .bind(Json(&job.step_plan))
        .bind(job.status.as_str())
        .bind(job.created_utc)
        .bind(Json(&job.sensitive_values))
        .execute(&self.pool)
        .await?;

        tracing::debug!("Inserted job execution {}", job.id);

        Ok(job)
    }

    async fn get_job_execution(&self, id: &str) -> Result<JobExecution> {
        let sql = format!("SELECT {} FROM job_executions WHERE id = $1", JOB_COLUMNS);
        let row = sqlx::query_as::<_, JobExecutionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        row.try_into()
    }

    async fn delete_queued_job_execution(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let job = Self::fetch_for_update(&mut tx, id).await?;

        if job.status != JobExecutionStatus::Queued {
            return Err(StoreError::NotQueued {
                job_id: id.to_string(),
                status: job.status,
            });
        }

        sqlx::query("DELETE FROM job_executions WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(())
    }

    async fn update_job_execution_status(
        &self,
        id: &str,
        update: JobExecutionStatusUpdate,
    ) -> Result<JobExecution> {
        let mut tx = self.pool.begin().await?;
        let mut job = Self::fetch_for_update(&mut tx, id).await?;

        apply_status_update(&mut job, &update)?;
        Self::write_state(&mut tx, &job).await?;
        tx.commit().await?;

        Ok(job)
    }

    async fn append_job_execution_events(
        &self,
        id: &str,
        events: Vec<JobExecutionEvent>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let mut job = Self::fetch_for_update(&mut tx, id).await?;

        let mut patched = false;
        for event in &events {
            if let Some(patch) = &event.metadata {
                apply_metadata_patch(&mut job.metadata, patch);
                patched = true;
            }

            sqlx::query(
                r#"
                INSERT INTO job_execution_events (job_execution_id, event, created_utc)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(id)
            .bind(Json(event))
            .bind(event.timestamp_utc.unwrap_or_else(Utc::now))
            .execute(&mut *tx)
            .await?;
        }

        if patched {
            sqlx::query("UPDATE job_executions SET metadata = $2 WHERE id = $1")
                .bind(id)
                .bind(Json(&job.metadata))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_job_execution_artifacts(&self, id: &str) -> Result<Vec<JobExecutionArtifact>> {
        self.ensure_exists(id).await?;

        let rows: Vec<ArtifactRow> = sqlx::query_as(
            r#"
            SELECT job_execution_id, path, url, size_bytes
            FROM job_execution_artifacts
            WHERE job_execution_id = $1
            ORDER BY path ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn save_job_execution_artifacts(
        &self,
        id: &str,
        artifacts: Vec<JobExecutionArtifact>,
    ) -> Result<()> {
        self.ensure_exists(id).await?;

        let mut tx = self.pool.begin().await?;
        for artifact in artifacts {
            sqlx::query(
                r#"
                INSERT INTO job_execution_artifacts (job_execution_id, path, url, size_bytes)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (job_execution_id, path)
                DO UPDATE SET url = EXCLUDED.url, size_bytes = EXCLUDED.size_bytes
                "#,
            )
            .bind(id)
            .bind(&artifact.path)
            .bind(&artifact.url)
            .bind(i64::try_from(artifact.size_bytes).unwrap_or(i64::MAX))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn get_job_execution_test_report(
        &self,
        id: &str,
    ) -> Result<Option<JobExecutionTestReport>> {
        self.ensure_exists(id).await?;

        let row: Option<(Json<JobExecutionTestReport>,)> = sqlx::query_as(
            "SELECT report FROM job_execution_test_reports WHERE job_execution_id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(report,)| report.0))
    }

    async fn save_job_execution_test_report(
        &self,
        id: &str,
        report: JobExecutionTestReport,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::fetch_for_update(&mut tx, id).await?;

        sqlx::query(
            r#"
            INSERT INTO job_execution_test_reports (job_execution_id, report)
            VALUES ($1, $2)
            ON CONFLICT (job_execution_id) DO UPDATE SET report = EXCLUDED.report
            "#,
        )
        .bind(id)
        .bind(Json(&report))
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE job_executions SET test_summary = $2 WHERE id = $1")
            .bind(id)
            .bind(Json(report.summary()))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn clear_queued_job_executions(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM job_executions WHERE status = $1")
            .bind(JobExecutionStatus::Queued.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn flush_job_execution_history(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM job_executions WHERE status IN ($1, $2)")
            .bind(JobExecutionStatus::Succeeded.as_str())
            .bind(JobExecutionStatus::Failed.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn lease_job_execution(
        &self,
        agent_id: &str,
        capabilities: &BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> Result<Option<JobExecution>> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            SELECT {} FROM job_executions
            WHERE status = $1
            ORDER BY created_utc ASC
            FOR UPDATE SKIP LOCKED
            "#,
            JOB_COLUMNS
        );
        let rows = sqlx::query_as::<_, JobExecutionRow>(&sql)
            .bind(JobExecutionStatus::Queued.as_str())
            .fetch_all(&mut *tx)
            .await?;

        let mut leased = None;
        for row in rows {
            let mut job: JobExecution = row.try_into()?;
            if !unmet_requirements(&job.required_capabilities, capabilities).is_empty() {
                continue;
            }

            job.status = JobExecutionStatus::Leased;
            job.leased_by_agent_id = agent_id.to_string();
            job.leased_utc = Some(now);
            Self::write_state(&mut tx, &job).await?;
            leased = Some(job);
            break;
        }

        tx.commit().await?;
        Ok(leased)
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobExecutionRow {
    id: String,
    script: String,
    env: Json<BTreeMap<String, String>>,
    required_capabilities: Json<BTreeMap<String, String>>,
    timeout_seconds: i64,
    artifact_globs: Json<Vec<String>>,
    caches: Json<Vec<JobCacheSpec>>,
    source: Option<Json<SourceSpec>>,
    metadata: Json<BTreeMap<String, String>>,
    step_plan: Json<Vec<JobStepPlanItem>>,
    current_step: String,
    status: String,
    created_utc: DateTime<Utc>,
    started_utc: Option<DateTime<Utc>>,
    finished_utc: Option<DateTime<Utc>>,
    leased_utc: Option<DateTime<Utc>>,
    leased_by_agent_id: String,
    exit_code: Option<i32>,
    error: String,
    output: String,
    test_summary: Option<Json<JobExecutionTestSummary>>,
    sensitive_values: Json<Vec<String>>,
}

impl TryFrom<JobExecutionRow> for JobExecution {
    type Error = StoreError;

    fn try_from(row: JobExecutionRow) -> Result<Self> {
        let status = JobExecutionStatus::parse(&row.status).ok_or_else(|| {
            StoreError::Invalid(format!(
                "job execution {} has unknown status {:?}",
                row.id, row.status
            ))
        })?;

        Ok(JobExecution {
            id: row.id,
            script: row.script,
            env: row.env.0,
            required_capabilities: row.required_capabilities.0,
            timeout_seconds: u64::try_from(row.timeout_seconds).unwrap_or(0),
            artifact_globs: row.artifact_globs.0,
            caches: row.caches.0,
            source: row.source.map(|source| source.0),
            metadata: row.metadata.0,
            step_plan: row.step_plan.0,
            current_step: row.current_step,
            status,
            created_utc: row.created_utc,
            started_utc: row.started_utc,
            finished_utc: row.finished_utc,
            leased_utc: row.leased_utc,
            leased_by_agent_id: row.leased_by_agent_id,
            exit_code: row.exit_code,
            error: row.error,
            output: row.output,
            test_summary: row.test_summary.map(|summary| summary.0),
            unmet_requirements: Vec::new(),
            sensitive_values: row.sensitive_values.0,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ArtifactRow {
    job_execution_id: String,
    path: String,
    url: String,
    size_bytes: i64,
}

impl From<ArtifactRow> for JobExecutionArtifact {
    fn from(row: ArtifactRow) -> Self {
        JobExecutionArtifact {
            job_execution_id: row.job_execution_id,
            path: row.path,
            url: row.url,
            size_bytes: u64::try_from(row.size_bytes).unwrap_or(0),
        }
    }
}
