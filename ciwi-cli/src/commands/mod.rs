//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod admin;
mod job;

pub use admin::AdminCommands;
pub use job::JobCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Job execution inspection and lifecycle
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Bulk queue and history maintenance
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Job { command } => job::handle_job_command(command, config).await,
        Commands::Admin { command } => admin::handle_admin_command(command, config).await,
    }
}
