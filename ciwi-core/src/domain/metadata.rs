//! Metadata keys with meaning to the control plane
//!
//! Job metadata is a free-form string table filled in by pipeline expansion.
//! Display grouping and dependency analysis read the keys below.

pub const PIPELINE_RUN_ID: &str = "pipeline_run_id";
pub const PIPELINE_JOB_ID: &str = "pipeline_job_id";
pub const PIPELINE_ID: &str = "pipeline_id";
pub const PROJECT: &str = "project";
pub const PROJECT_ID: &str = "project_id";
pub const CHAIN_RUN_ID: &str = "chain_run_id";
pub const MATRIX_NAME: &str = "matrix_name";
