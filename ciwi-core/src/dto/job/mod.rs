//! Job execution DTOs for inter-service communication

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::event::JobExecutionEvent;
use crate::domain::job::{JobCacheSpec, JobExecutionStatus, JobStepPlanItem, SourceSpec};

/// Request to create a new queued job execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateJobExecutionRequest {
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
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sensitive_values: Vec<String>,
}

/// Status report sent by an agent while it executes a job
///
/// `status` stays a string on the wire so an unknown value can be rejected
/// with a readable message instead of a decode failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateJobExecutionStatusRequest {
    pub agent_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_utc: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<JobExecutionEvent>,
}

/// Validated status transition handed to the store
#[derive(Debug, Clone, PartialEq)]
pub struct JobExecutionStatusUpdate {
    pub agent_id: String,
    pub status: JobExecutionStatus,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    pub output: Option<String>,
    pub current_step: Option<String>,
    pub timestamp_utc: DateTime<Utc>,
}
