//! Shared handler state

use std::sync::Arc;

use crate::hooks::Hooks;
use crate::service::agent::AgentRegistry;
use crate::service::artifacts::ArtifactStore;
use crate::store::Store;

/// State handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub artifacts: ArtifactStore,
    pub hooks: Hooks,
    pub agents: AgentRegistry,
}

impl AppState {
    /// Creates state with no hooks installed and an empty agent table
    pub fn new(store: Arc<dyn Store>, artifacts: ArtifactStore) -> Self {
        Self {
            store,
            artifacts,
            hooks: Hooks::default(),
            agents: AgentRegistry::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_agents(mut self, agents: AgentRegistry) -> Self {
        self.agents = agents;
        self
    }
}
