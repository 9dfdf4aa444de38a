//! ciwi Core
//!
//! Core types and abstractions for the ciwi continuous-integration service.
//!
//! This crate contains:
//! - Domain types: Core business entities (job executions, artifacts, test reports)
//! - DTOs: Request bodies and response views of the jobs API
//! - Step markers: The line protocol agents emit between script steps

pub mod domain;
pub mod dto;
pub mod step_marker;
