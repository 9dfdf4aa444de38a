//! Job execution domain types

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Agent identity the server uses when it mutates a job nobody holds a lease on.
pub const SERVER_CONTROL_AGENT_ID: &str = "server-control";

/// One attempt at running a script on a build agent.
///
/// Structure shared between the server (persists) and agents (update).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobExecution {
    pub id: String,
    #[serde(default)]
    pub script: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub required_capabilities: BTreeMap<String, String>,
    #[serde(default)]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub artifact_globs: Vec<String>,
    #[serde(default)]
    pub caches: Vec<JobCacheSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceSpec>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub step_plan: Vec<JobStepPlanItem>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_step: String,
    pub status: JobExecutionStatus,
    pub created_utc: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_utc: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_utc: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leased_utc: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub leased_by_agent_id: String,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_summary: Option<JobExecutionTestSummary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unmet_requirements: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sensitive_values: Vec<String>,
}

impl JobExecution {
    /// Trimmed metadata value, empty when the key is absent
    pub fn metadata_value(&self, key: &str) -> &str {
        self.metadata.get(key).map(|v| v.trim()).unwrap_or("")
    }

    /// Whether the job is queued, leased or running
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Whether an agent currently holds a lease on this job
    pub fn is_leased(&self) -> bool {
        !self.leased_by_agent_id.trim().is_empty()
    }

    /// Whether an agent has ever started executing this job
    pub fn has_started(&self) -> bool {
        self.started_utc.is_some()
    }
}

/// Job execution status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobExecutionStatus {
    #[default]
    Queued,
    Leased,
    Running,
    Succeeded,
    Failed,
}

impl JobExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobExecutionStatus::Queued => "queued",
            JobExecutionStatus::Leased => "leased",
            JobExecutionStatus::Running => "running",
            JobExecutionStatus::Succeeded => "succeeded",
            JobExecutionStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "queued" => Some(JobExecutionStatus::Queued),
            "leased" => Some(JobExecutionStatus::Leased),
            "running" => Some(JobExecutionStatus::Running),
            "succeeded" => Some(JobExecutionStatus::Succeeded),
            "failed" => Some(JobExecutionStatus::Failed),
            _ => None,
        }
    }

    /// Parses a status an agent is allowed to report
    ///
    /// Only `running`, `succeeded` and `failed` are accepted.
    pub fn parse_update(value: &str) -> Option<Self> {
        Self::parse(value).filter(|status| status.is_valid_update())
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            JobExecutionStatus::Queued | JobExecutionStatus::Leased | JobExecutionStatus::Running
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobExecutionStatus::Succeeded | JobExecutionStatus::Failed
        )
    }

    pub fn is_valid_update(&self) -> bool {
        matches!(
            self,
            JobExecutionStatus::Running | JobExecutionStatus::Succeeded | JobExecutionStatus::Failed
        )
    }
}

impl std::fmt::Display for JobExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache directory an agent restores before running and exposes through an env var
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCacheSpec {
    pub id: String,
    #[serde(default)]
    pub env: String,
}

/// Source checkout for a job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub repo: String,
    #[serde(default, rename = "ref", skip_serializing_if = "String::is_empty")]
    pub git_ref: String,
}

/// One planned step of a job script
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStepPlanItem {
    pub index: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub script: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub test_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub test_format: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub test_report: String,
}

/// Aggregated test counts shown next to a job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobExecutionTestSummary {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_sets() {
        assert!(JobExecutionStatus::Queued.is_active());
        assert!(JobExecutionStatus::Leased.is_active());
        assert!(JobExecutionStatus::Running.is_active());
        assert!(JobExecutionStatus::Succeeded.is_terminal());
        assert!(JobExecutionStatus::Failed.is_terminal());
        assert!(!JobExecutionStatus::Failed.is_active());
    }

    #[test]
    fn test_parse_update_rejects_non_agent_statuses() {
        assert_eq!(
            JobExecutionStatus::parse_update("Running"),
            Some(JobExecutionStatus::Running)
        );
        assert_eq!(
            JobExecutionStatus::parse_update(" failed "),
            Some(JobExecutionStatus::Failed)
        );
        assert_eq!(JobExecutionStatus::parse_update("queued"), None);
        assert_eq!(JobExecutionStatus::parse_update("leased"), None);
        assert_eq!(JobExecutionStatus::parse_update("done"), None);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&JobExecutionStatus::Succeeded).unwrap();
        assert_eq!(json, "\"succeeded\"");
    }

    #[test]
    fn test_source_ref_field_name() {
        let source = SourceSpec {
            repo: "https://example.com/repo.git".to_string(),
            git_ref: "main".to_string(),
        };
        let value = serde_json::to_value(&source).unwrap();
        assert_eq!(value["ref"], "main");
    }

    #[test]
    fn test_metadata_value_trims() {
        let mut job = JobExecution::default();
        job.metadata
            .insert("project".to_string(), "  ciwi ".to_string());
        assert_eq!(job.metadata_value("project"), "ciwi");
        assert_eq!(job.metadata_value("missing"), "");
    }
}
