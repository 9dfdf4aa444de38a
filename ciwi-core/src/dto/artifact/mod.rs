//! Artifact upload DTOs

use serde::{Deserialize, Serialize};

use crate::domain::artifact::JobExecutionArtifact;

/// One file in a JSON artifact upload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadArtifact {
    pub path: String,
    pub data_base64: String,
}

/// Request body of `POST /api/v1/jobs/{id}/artifacts`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadArtifactsRequest {
    pub agent_id: String,
    #[serde(default)]
    pub artifacts: Vec<UploadArtifact>,
}

/// Artifact listing of a job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobExecutionArtifactsView {
    pub artifacts: Vec<JobExecutionArtifact>,
}
