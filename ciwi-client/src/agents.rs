//! Agent endpoints

use ciwi_core::dto::agent::{AgentPresence, AgentsView, LeaseJobRequest, LeaseJobResponse};

use crate::CiwiClient;
use crate::error::Result;

impl CiwiClient {
    /// Ask for the oldest queued job the agent's capabilities satisfy
    pub async fn lease_job(&self, req: &LeaseJobRequest) -> Result<LeaseJobResponse> {
        let url = format!("{}/api/v1/agent/lease", self.base_url);
        let response = self.client.post(&url).json(req).send().await?;

        self.handle_response(response).await
    }

    /// Agents the server has heard from, most recently seen first
    pub async fn list_agents(&self) -> Result<Vec<AgentPresence>> {
        let url = format!("{}/api/v1/agents", self.base_url);
        let response = self.client.get(&url).send().await?;
        let view: AgentsView = self.handle_response(response).await?;

        Ok(view.agents)
    }
}
