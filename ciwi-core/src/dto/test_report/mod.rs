//! Test report DTOs

use serde::{Deserialize, Serialize};

use crate::domain::test_report::JobExecutionTestReport;

/// Request body of `POST /api/v1/jobs/{id}/tests`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadTestReportRequest {
    pub agent_id: String,
    pub report: JobExecutionTestReport,
}

/// Test report of a job; serializes as `{}` when none was uploaded
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobExecutionTestReportView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<JobExecutionTestReport>,
}
