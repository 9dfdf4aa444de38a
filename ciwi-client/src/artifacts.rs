//! Artifact and test report endpoints

use ciwi_core::domain::artifact::JobExecutionArtifact;
use ciwi_core::domain::test_report::JobExecutionTestReport;
use ciwi_core::dto::artifact::{JobExecutionArtifactsView, UploadArtifactsRequest};
use ciwi_core::dto::test_report::{JobExecutionTestReportView, UploadTestReportRequest};

use crate::CiwiClient;
use crate::error::{ClientError, Result};

/// Header naming the uploading agent on raw ZIP uploads
const AGENT_ID_HEADER: &str = "X-CIWI-Agent-ID";

impl CiwiClient {
    // =============================================================================
    // Artifacts
    // =============================================================================

    /// List the artifacts of a job, including generated report files
    pub async fn list_artifacts(&self, job_id: &str) -> Result<Vec<JobExecutionArtifact>> {
        let response = self
            .client
            .get(self.job_url(job_id, "artifacts"))
            .send()
            .await?;
        let view: JobExecutionArtifactsView = self.handle_response(response).await?;
        Ok(view.artifacts)
    }

    /// Upload base64-encoded artifacts as the agent holding the job
    pub async fn upload_artifacts(
        &self,
        job_id: &str,
        req: &UploadArtifactsRequest,
    ) -> Result<Vec<JobExecutionArtifact>> {
        let response = self
            .client
            .post(self.job_url(job_id, "artifacts"))
            .json(req)
            .send()
            .await?;
        let view: JobExecutionArtifactsView = self.handle_response(response).await?;
        Ok(view.artifacts)
    }

    /// Upload a ZIP archive whose entries become artifacts
    pub async fn upload_artifacts_zip(
        &self,
        job_id: &str,
        agent_id: &str,
        archive: Vec<u8>,
    ) -> Result<Vec<JobExecutionArtifact>> {
        if agent_id.trim().is_empty() {
            return Err(ClientError::InvalidRequest("agent_id is required".to_string()));
        }

        let response = self
            .client
            .post(self.job_url(job_id, "artifacts/upload-zip"))
            .header(AGENT_ID_HEADER, agent_id)
            .header(reqwest::header::CONTENT_TYPE, "application/zip")
            .body(archive)
            .send()
            .await?;
        let view: JobExecutionArtifactsView = self.handle_response(response).await?;
        Ok(view.artifacts)
    }

    /// Download artifacts as a ZIP archive
    ///
    /// # Arguments
    /// * `prefix` - Only include paths equal to or below this directory; all artifacts when `None`
    ///
    /// # Returns
    /// The raw archive bytes
    pub async fn download_artifacts(&self, job_id: &str, prefix: Option<&str>) -> Result<Vec<u8>> {
        let request = match prefix.map(str::trim).filter(|prefix| !prefix.is_empty()) {
            Some(prefix) => self
                .client
                .get(self.job_url(job_id, "artifacts/download"))
                .query(&[("prefix", prefix)]),
            None => self.client.get(self.job_url(job_id, "artifacts/download-all")),
        };

        let response = request.send().await?;
        self.handle_bytes(response).await
    }

    // =============================================================================
    // Test Reports
    // =============================================================================

    /// Get the test report of a job, `None` when no report was uploaded
    pub async fn get_tests(&self, job_id: &str) -> Result<Option<JobExecutionTestReport>> {
        let response = self
            .client
            .get(self.job_url(job_id, "tests"))
            .send()
            .await?;
        let view: JobExecutionTestReportView = self.handle_response(response).await?;
        Ok(view.report)
    }

    /// Upload a test report as the agent holding the job
    pub async fn upload_tests(
        &self,
        job_id: &str,
        req: &UploadTestReportRequest,
    ) -> Result<JobExecutionTestReport> {
        let response = self
            .client
            .post(self.job_url(job_id, "tests"))
            .json(req)
            .send()
            .await?;
        let view: JobExecutionTestReportView = self.handle_response(response).await?;
        view.report
            .ok_or_else(|| ClientError::ParseError("response carries no report".to_string()))
    }
}
