//! Service Module
//!
//! Business logic layer of the control plane.
//! Services sit between the HTTP handlers and the `Store`, and hold the
//! pure display, artifact and dependency logic.

pub mod agent;
pub mod artifacts;
pub mod blocked_by;
pub mod display;
pub mod job;

// Re-export for convenience
pub use job as job_service;
