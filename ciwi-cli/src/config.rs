//! Configuration module
//!
//! Handles CLI configuration shared by every command.

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the ciwi server
    pub server_url: String,
}
