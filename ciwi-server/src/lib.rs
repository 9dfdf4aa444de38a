//! ciwi control plane
//!
//! Job execution lifecycle, artifact storage and display shaping behind an
//! axum HTTP surface.

pub mod api;
pub mod config;
pub mod db;
pub mod hooks;
pub mod service;
pub mod state;
pub mod store;
