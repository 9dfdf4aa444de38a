//! Job-related API endpoints

use ciwi_core::domain::job::JobExecution;
use ciwi_core::dto::job::UpdateJobExecutionStatusRequest;
use ciwi_core::dto::view::{
    BlockedByView, ClearQueueView, DeleteJobExecutionView, FlushHistoryView,
    JobExecutionListView, JobExecutionPageView, JobExecutionSummaryView, JobExecutionView,
};

use crate::CiwiClient;
use crate::error::Result;

/// Side of the job list a paged listing reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobListView {
    Queued,
    History,
}

impl JobListView {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobListView::Queued => "queued",
            JobListView::History => "history",
        }
    }
}

impl CiwiClient {
    // =============================================================================
    // Listing
    // =============================================================================

    /// List every job execution, newest first
    pub async fn list_jobs(&self) -> Result<Vec<JobExecution>> {
        let response = self.client.get(self.jobs_url()).send().await?;
        let view: JobExecutionListView = self.handle_response(response).await?;
        Ok(view.job_executions)
    }

    /// Fetch one page of the queued or finished jobs
    ///
    /// # Arguments
    /// * `view` - Which side of the list to page through
    /// * `offset`, `limit`, `max` - Paging and display cap; the server clamps them
    pub async fn list_jobs_page(
        &self,
        view: JobListView,
        offset: Option<usize>,
        limit: Option<usize>,
        max: Option<usize>,
    ) -> Result<JobExecutionPageView> {
        let mut query = vec![("view", view.as_str().to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(max) = max {
            query.push(("max", max.to_string()));
        }

        let response = self
            .client
            .get(self.jobs_url())
            .query(&query)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Grouped counts of queued and finished jobs
    pub async fn jobs_summary(&self, max: Option<usize>) -> Result<JobExecutionSummaryView> {
        let mut query = vec![("view", "summary".to_string())];
        if let Some(max) = max {
            query.push(("max", max.to_string()));
        }

        let response = self
            .client
            .get(self.jobs_url())
            .query(&query)
            .send()
            .await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Job Lifecycle
    // =============================================================================

    /// Get a job execution by ID
    pub async fn get_job(&self, job_id: &str) -> Result<JobExecution> {
        let response = self.client.get(self.job_url(job_id, "")).send().await?;
        let view: JobExecutionView = self.handle_response(response).await?;
        Ok(view.job_execution)
    }

    /// Delete a job execution that is still queued
    pub async fn delete_job(&self, job_id: &str) -> Result<DeleteJobExecutionView> {
        let response = self.client.delete(self.job_url(job_id, "")).send().await?;
        self.handle_response(response).await
    }

    /// Cancel an active job execution
    pub async fn cancel_job(&self, job_id: &str) -> Result<JobExecution> {
        let response = self
            .client
            .post(self.job_url(job_id, "cancel"))
            .send()
            .await?;
        let view: JobExecutionView = self.handle_response(response).await?;
        Ok(view.job_execution)
    }

    /// Queue a fresh copy of a job execution that has started
    ///
    /// # Returns
    /// The newly created job execution
    pub async fn rerun_job(&self, job_id: &str) -> Result<JobExecution> {
        let response = self
            .client
            .post(self.job_url(job_id, "rerun"))
            .send()
            .await?;
        let view: JobExecutionView = self.handle_response(response).await?;
        Ok(view.job_execution)
    }

    /// Report progress or completion of a job as an agent
    pub async fn update_status(
        &self,
        job_id: &str,
        req: &UpdateJobExecutionStatusRequest,
    ) -> Result<JobExecution> {
        let response = self
            .client
            .post(self.job_url(job_id, "status"))
            .json(req)
            .send()
            .await?;
        let view: JobExecutionView = self.handle_response(response).await?;
        Ok(view.job_execution)
    }

    /// Which failed dependency cancelled a job, if any
    pub async fn blocked_by(&self, job_id: &str) -> Result<BlockedByView> {
        let response = self
            .client
            .get(self.job_url(job_id, "blocked-by"))
            .send()
            .await?;
        self.handle_response(response).await
    }

    // =============================================================================
    // Bulk Administration
    // =============================================================================

    /// Remove every queued job execution
    pub async fn clear_queue(&self) -> Result<u64> {
        let url = format!("{}/clear-queue", self.jobs_url());
        let response = self.client.post(&url).send().await?;
        let view: ClearQueueView = self.handle_response(response).await?;
        Ok(view.cleared)
    }

    /// Remove every finished job execution
    pub async fn flush_history(&self) -> Result<u64> {
        let url = format!("{}/flush-history", self.jobs_url());
        let response = self.client.post(&url).send().await?;
        let view: FlushHistoryView = self.handle_response(response).await?;
        Ok(view.flushed)
    }
}
