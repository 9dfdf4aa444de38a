//! Dependency analysis for cancelled jobs
//!
//! When a pipeline job or an upstream pipeline fails, the jobs waiting on it
//! are failed before they ever start, with an error naming the dependency.
//! This module maps such a job back to the job execution that caused it.

use std::sync::LazyLock;

use ciwi_core::domain::job::{JobExecution, JobExecutionStatus};
use ciwi_core::domain::metadata;
use ciwi_core::dto::view::{BlockedByView, BlockedDependency};
use regex::Regex;

static REQUIRED_JOB_FAILED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)cancelled:\s*required job\s+(.+?)\s+failed").expect("valid regex")
});

static UPSTREAM_PIPELINE_FAILED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)cancelled:\s*upstream pipeline\s+(.+?)\s+failed").expect("valid regex")
});

/// What kind of dependency cancelled a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    RequiredJob,
    UpstreamPipeline,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::RequiredJob => "required_job",
            BlockKind::UpstreamPipeline => "upstream_pipeline",
        }
    }
}

/// Dependency named in a blocked job's error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockReason {
    pub kind: BlockKind,
    pub target: String,
}

/// Parses the dependency out of a job that failed without ever starting
///
/// Returns `None` for any job that is not failed, has started, or carries
/// an error in neither of the two cancellation forms.
pub fn block_reason(job: &JobExecution) -> Option<BlockReason> {
    if job.status != JobExecutionStatus::Failed || job.has_started() {
        return None;
    }

    let patterns = [
        (BlockKind::RequiredJob, &*REQUIRED_JOB_FAILED),
        (BlockKind::UpstreamPipeline, &*UPSTREAM_PIPELINE_FAILED),
    ];

    patterns.into_iter().find_map(|(kind, pattern)| {
        let target = pattern.captures(&job.error)?.get(1)?.as_str().trim();
        (!target.is_empty()).then(|| BlockReason {
            kind,
            target: target.to_string(),
        })
    })
}

/// Resolves the job execution that blocked `job`, searching `all_jobs`
pub fn analyze_blocked_by(job: &JobExecution, all_jobs: &[JobExecution]) -> BlockedByView {
    let Some(reason) = block_reason(job) else {
        return BlockedByView::default();
    };

    let candidate = all_jobs
        .iter()
        .filter(|candidate| candidate.id != job.id)
        .filter(|candidate| candidate.status.is_terminal())
        .filter(|candidate| candidate.status != JobExecutionStatus::Succeeded)
        .filter(|candidate| matches_dependency(job, candidate, &reason))
        .max_by(|a, b| {
            a.created_utc
                .cmp(&b.created_utc)
                .then_with(|| a.id.trim().cmp(b.id.trim()))
        });

    BlockedByView {
        blocked: true,
        kind: Some(reason.kind.as_str().to_string()),
        target: Some(reason.target.clone()),
        dependency: candidate.map(|candidate| BlockedDependency {
            job_execution_id: candidate.id.trim().to_string(),
            pipeline_id: candidate.metadata_value(metadata::PIPELINE_ID).to_string(),
            pipeline_job_id: candidate
                .metadata_value(metadata::PIPELINE_JOB_ID)
                .to_string(),
            matrix_name: candidate.metadata_value(metadata::MATRIX_NAME).to_string(),
            reason: dependency_reason(candidate),
        }),
    }
}

fn matches_dependency(blocked: &JobExecution, candidate: &JobExecution, reason: &BlockReason) -> bool {
    // Only `project` is compared here; display grouping also looks at `project_id`.
    let (target_key, scope_keys): (&str, &[&str]) = match reason.kind {
        BlockKind::RequiredJob => (
            metadata::PIPELINE_JOB_ID,
            &[
                metadata::PROJECT,
                metadata::PIPELINE_ID,
                metadata::PIPELINE_RUN_ID,
            ],
        ),
        BlockKind::UpstreamPipeline => (
            metadata::PIPELINE_ID,
            &[metadata::PROJECT, metadata::CHAIN_RUN_ID],
        ),
    };

    if candidate.metadata_value(target_key) != reason.target {
        return false;
    }

    scope_keys.iter().all(|key| {
        let want = blocked.metadata_value(key);
        want.is_empty() || candidate.metadata_value(key) == want
    })
}

fn dependency_reason(candidate: &JobExecution) -> String {
    let error = candidate.error.trim();
    if error.is_empty() {
        candidate.status.to_string()
    } else {
        error.to_string()
    }
}
