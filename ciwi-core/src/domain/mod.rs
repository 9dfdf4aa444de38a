//! Core domain types
//!
//! This module contains the core domain structures used across ciwi services.
//! These types represent the fundamental business entities and are shared between
//! the server (for persistence) and agents or tools (for execution and display).

pub mod artifact;
pub mod event;
pub mod job;
pub mod metadata;
pub mod test_report;
