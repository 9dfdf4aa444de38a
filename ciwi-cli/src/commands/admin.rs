//! Admin command handlers
//!
//! Bulk removal of queued jobs and finished history.

use anyhow::{Context, Result};
use ciwi_client::CiwiClient;
use clap::Subcommand;
use colored::*;

use crate::config::Config;

/// Admin subcommands
#[derive(Subcommand)]
pub enum AdminCommands {
    /// Remove every queued job execution
    ClearQueue,
    /// Remove every finished job execution
    FlushHistory,
}

pub async fn handle_admin_command(command: AdminCommands, config: &Config) -> Result<()> {
    let client = CiwiClient::new(&config.server_url);

    match command {
        AdminCommands::ClearQueue => {
            let cleared = client
                .clear_queue()
                .await
                .context("Failed to clear the queue")?;
            println!(
                "{} Cleared {} queued job(s)",
                "✓".green(),
                cleared.to_string().bold()
            );
        }
        AdminCommands::FlushHistory => {
            let flushed = client
                .flush_history()
                .await
                .context("Failed to flush job history")?;
            println!(
                "{} Flushed {} finished job(s)",
                "✓".green(),
                flushed.to_string().bold()
            );
        }
    }

    Ok(())
}
