//! Optional callbacks the embedding application installs
//!
//! Each hook is a capability on the bundle; an absent hook is skipped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ciwi_core::domain::job::JobExecution;

pub type AttachMany = Arc<dyn Fn(&mut [JobExecution]) + Send + Sync>;
pub type AttachOne = Arc<dyn Fn(&mut JobExecution) + Send + Sync>;
pub type MarkAgentSeen = Arc<dyn Fn(&str, DateTime<Utc>) + Send + Sync>;
pub type OnJobUpdated = Arc<dyn Fn(&JobExecution) + Send + Sync>;
pub type Now = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Clone, Default)]
pub struct Hooks {
    pub attach_test_summaries: Option<AttachMany>,
    pub attach_unmet_requirements: Option<AttachMany>,
    pub attach_test_summary: Option<AttachOne>,
    pub attach_unmet_requirements_to_execution: Option<AttachOne>,
    pub mark_agent_seen: Option<MarkAgentSeen>,
    pub on_job_updated: Option<OnJobUpdated>,
    pub now: Option<Now>,
}

impl Hooks {
    /// Current UTC time from the `now` hook, or the wall clock
    ///
    /// A hook answering with a timestamp at or before the Unix epoch counts
    /// as unset.
    pub fn now_utc(&self) -> DateTime<Utc> {
        match &self.now {
            Some(now) => {
                let ts = now();
                if ts.timestamp() <= 0 { Utc::now() } else { ts }
            }
            None => Utc::now(),
        }
    }

    /// Runs the list enrichers
    pub fn enrich_list(&self, jobs: &mut [JobExecution]) {
        if let Some(attach) = &self.attach_test_summaries {
            attach(jobs);
        }
        if let Some(attach) = &self.attach_unmet_requirements {
            attach(jobs);
        }
    }

    /// Runs the single-job enrichers
    pub fn enrich_one(&self, job: &mut JobExecution) {
        if let Some(attach) = &self.attach_test_summary {
            attach(job);
        }
        if let Some(attach) = &self.attach_unmet_requirements_to_execution {
            attach(job);
        }
    }

    pub fn agent_seen(&self, agent_id: &str, ts: DateTime<Utc>) {
        if let Some(mark) = &self.mark_agent_seen {
            mark(agent_id, ts);
        }
    }

    pub fn job_updated(&self, job: &JobExecution) {
        if let Some(notify) = &self.on_job_updated {
            notify(job);
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("attach_test_summaries", &self.attach_test_summaries.is_some())
            .field(
                "attach_unmet_requirements",
                &self.attach_unmet_requirements.is_some(),
            )
            .field("attach_test_summary", &self.attach_test_summary.is_some())
            .field(
                "attach_unmet_requirements_to_execution",
                &self.attach_unmet_requirements_to_execution.is_some(),
            )
            .field("mark_agent_seen", &self.mark_agent_seen.is_some())
            .field("on_job_updated", &self.on_job_updated.is_some())
            .field("now", &self.now.is_some())
            .finish()
    }
}
