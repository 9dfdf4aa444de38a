//! Path router for `/api/v1/jobs/{*rest}`
//!
//! Only the shape of the path is decided here. Handlers own their method
//! tables.

/// Resource addressed below a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobResource {
    Cancel,
    Rerun,
    Status,
    Artifacts,
    Tests,
    BlockedBy,
}

impl JobResource {
    fn parse(segment: &str) -> Option<Self> {
        match segment {
            "cancel" => Some(JobResource::Cancel),
            "rerun" => Some(JobResource::Rerun),
            "status" => Some(JobResource::Status),
            "artifacts" => Some(JobResource::Artifacts),
            "tests" => Some(JobResource::Tests),
            "blocked-by" => Some(JobResource::BlockedBy),
            _ => None,
        }
    }
}

/// Action below `{id}/artifacts`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactAction {
    UploadZip,
    Download,
    DownloadAll,
}

impl ArtifactAction {
    fn parse(segment: &str) -> Option<Self> {
        match segment {
            "upload-zip" => Some(ArtifactAction::UploadZip),
            "download" => Some(ArtifactAction::Download),
            "download-all" => Some(ArtifactAction::DownloadAll),
            _ => None,
        }
    }
}

/// A recognized job path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRoute {
    pub job_id: String,
    pub resource: Option<JobResource>,
    pub artifact_action: Option<ArtifactAction>,
}

/// Parses the tail after `/api/v1/jobs/`
///
/// Returns `None` for empty job ids, unknown resources and paths deeper
/// than `{id}/artifacts/{action}`. A single trailing slash is tolerated.
pub fn parse_job_route(tail: &str) -> Option<JobRoute> {
    let tail = tail.strip_prefix('/').unwrap_or(tail);
    let tail = tail.strip_suffix('/').unwrap_or(tail);
    let segments: Vec<&str> = tail.split('/').collect();

    let job_id = segments.first()?.trim();
    if job_id.is_empty() {
        return None;
    }

    let mut route = JobRoute {
        job_id: job_id.to_string(),
        resource: None,
        artifact_action: None,
    };

    match segments.as_slice() {
        [_] => {}
        [_, resource] => {
            route.resource = Some(JobResource::parse(resource)?);
        }
        [_, "artifacts", action] => {
            route.resource = Some(JobResource::Artifacts);
            route.artifact_action = Some(ArtifactAction::parse(action)?);
        }
        _ => return None,
    }

    Some(route)
}
