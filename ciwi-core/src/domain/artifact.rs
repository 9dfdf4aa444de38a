//! Artifact domain types

use serde::{Deserialize, Serialize};

/// Well-known artifact path of the synthesized test report
pub const TEST_REPORT_ARTIFACT_PATH: &str = "test-report.json";

/// Well-known artifact path of the synthesized coverage report
pub const COVERAGE_REPORT_ARTIFACT_PATH: &str = "coverage-report.json";

/// A file stored for a job execution, keyed by `(job_execution_id, path)`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobExecutionArtifact {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub job_execution_id: String,
    /// Normalized relative slash path inside the job's artifact directory
    pub path: String,
    /// Server-relative URL
    pub url: String,
    pub size_bytes: u64,
}
