//! Agent presence
//!
//! Remembers when each agent last talked to the server. The server binary
//! wires this into the `mark_agent_seen` hook.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use ciwi_core::dto::agent::AgentPresence;

use crate::hooks::MarkAgentSeen;

#[derive(Debug, Default, Clone)]
pub struct AgentRegistry {
    last_seen: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records contact from an agent; older timestamps never move the clock back
    pub fn mark_seen(&self, agent_id: &str, ts: DateTime<Utc>) {
        let agent_id = agent_id.trim();
        if agent_id.is_empty() {
            return;
        }

        let mut last_seen = match self.last_seen.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = last_seen.entry(agent_id.to_string()).or_insert(ts);
        if ts > *entry {
            *entry = ts;
        }
    }

    /// Known agents, most recently seen first
    pub fn list(&self) -> Vec<AgentPresence> {
        let last_seen = match self.last_seen.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut agents: Vec<AgentPresence> = last_seen
            .iter()
            .map(|(agent_id, ts)| AgentPresence {
                agent_id: agent_id.clone(),
                last_seen_utc: *ts,
            })
            .collect();
        agents.sort_by(|a, b| {
            b.last_seen_utc
                .cmp(&a.last_seen_utc)
                .then_with(|| a.agent_id.cmp(&b.agent_id))
        });
        agents
    }

    /// Hook that feeds this registry
    pub fn hook(&self) -> MarkAgentSeen {
        let registry = self.clone();
        Arc::new(move |agent_id: &str, ts: DateTime<Utc>| registry.mark_seen(agent_id, ts))
    }
}
