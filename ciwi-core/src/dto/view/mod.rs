//! Response views of the jobs API

use serde::{Deserialize, Serialize};

use crate::domain::job::JobExecution;

/// A single job execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobExecutionView {
    pub job_execution: JobExecution,
}

/// Unpaged listing of every job execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobExecutionListView {
    pub job_executions: Vec<JobExecution>,
}

/// One page of the queued or history side of the listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobExecutionPageView {
    pub view: String,
    pub max: usize,
    /// Size of the chosen side before paging
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub job_executions: Vec<JobExecution>,
}

/// Grouped overview of both sides of the listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobExecutionSummaryView {
    pub view: String,
    pub max: usize,
    pub total: usize,
    pub queued_count: usize,
    pub history_count: usize,
    pub queued_groups: Vec<DisplayGroupSummary>,
    pub history_groups: Vec<DisplayGroupSummary>,
}

/// A display row: either a single job or a collapsible run group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayGroupSummary {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub job_count: usize,
    pub collapsible: bool,
}

/// Why a job was cancelled before it started, if a dependency caused it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedByView {
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency: Option<BlockedDependency>,
}

/// The upstream job execution that caused a cancellation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedDependency {
    pub job_execution_id: String,
    #[serde(default)]
    pub pipeline_id: String,
    #[serde(default)]
    pub pipeline_job_id: String,
    #[serde(default)]
    pub matrix_name: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteJobExecutionView {
    pub deleted: bool,
    pub job_execution_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearQueueView {
    pub cleared: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushHistoryView {
    pub flushed: u64,
}
