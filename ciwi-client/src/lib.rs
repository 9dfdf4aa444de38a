//! ciwi HTTP Client
//!
//! A typed async client for the ciwi jobs API, shared by the operator CLI
//! and by agents reporting progress.
//!
//! # Example
//!
//! ```no_run
//! use ciwi_client::CiwiClient;
//!
//! #[tokio::main]
//! async fn main() -> ciwi_client::Result<()> {
//!     let client = CiwiClient::new("http://localhost:8112");
//!
//!     let summary = client.jobs_summary(Some(150)).await?;
//!     println!("{} queued, {} finished", summary.queued_count, summary.history_count);
//!     Ok(())
//! }
//! ```

pub mod error;
mod agents;
mod artifacts;
mod jobs;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use jobs::JobListView;

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the ciwi server API
///
/// Methods are organized into groups:
/// - Job listing, inspection and lifecycle actions
/// - Artifacts and test reports
/// - Agent leasing and status reports
#[derive(Debug, Clone)]
pub struct CiwiClient {
    /// Base URL of the server (e.g., "http://localhost:8112")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl CiwiClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the server (e.g., "http://localhost:8112")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn jobs_url(&self) -> String {
        format!("{}/api/v1/jobs", self.base_url)
    }

    fn job_url(&self, job_id: &str, resource: &str) -> String {
        if resource.is_empty() {
            format!("{}/api/v1/jobs/{}", self.base_url, job_id)
        } else {
            format!("{}/api/v1/jobs/{}/{}", self.base_url, job_id, resource)
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and deserialize the JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = Self::check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Check the status code and return the raw body
    async fn handle_bytes(&self, response: reqwest::Response) -> Result<Vec<u8>> {
        let response = Self::check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Turns non-2xx responses into `ClientError::ApiError` with the text body
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::debug!("Server answered {}: {}", status, error_text.trim_end());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = CiwiClient::new("http://localhost:8112/");
        assert_eq!(client.base_url(), "http://localhost:8112");
    }

    #[test]
    fn test_job_urls() {
        let client = CiwiClient::with_client("http://ciwi:8112", Client::new());
        assert_eq!(client.jobs_url(), "http://ciwi:8112/api/v1/jobs");
        assert_eq!(
            client.job_url("job-1", ""),
            "http://ciwi:8112/api/v1/jobs/job-1"
        );
        assert_eq!(
            client.job_url("job-1", "artifacts/download"),
            "http://ciwi:8112/api/v1/jobs/job-1/artifacts/download"
        );
    }
}
