//! Agent DTOs
//!
//! Data transfer objects for agent leasing and presence.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::job::JobExecution;

/// Request from an agent asking for the next job it can run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseJobRequest {
    pub agent_id: String,
    #[serde(default)]
    pub capabilities: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeaseJobResponse {
    pub assigned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_execution: Option<JobExecution>,
}

/// Last time the server heard from an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPresence {
    pub agent_id: String,
    pub last_seen_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentsView {
    pub agents: Vec<AgentPresence>,
}
