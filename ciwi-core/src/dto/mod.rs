//! Data Transfer Objects for inter-service communication
//!
//! This module contains DTOs used for communication between the ciwi server,
//! build agents and operator tooling. Request bodies and response views of
//! the jobs API live here so the server and the client agree on the wire shape.

pub mod agent;
pub mod artifact;
pub mod job;
pub mod test_report;
pub mod view;
