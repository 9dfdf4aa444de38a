//! Job command handlers
//!
//! Handles all job-related CLI commands including listing, viewing details,
//! lifecycle actions and artifact access.

use std::path::PathBuf;

use anyhow::{Context, Result};
use ciwi_client::{CiwiClient, JobListView};
use ciwi_core::domain::artifact::JobExecutionArtifact;
use ciwi_core::domain::job::{JobExecution, JobExecutionStatus};
use ciwi_core::domain::test_report::JobExecutionTestReport;
use ciwi_core::dto::view::DisplayGroupSummary;
use clap::{Subcommand, ValueEnum};
use colored::*;

use crate::config::Config;

/// Side of the job list to page through
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ListSide {
    Queued,
    History,
}

impl From<ListSide> for JobListView {
    fn from(side: ListSide) -> Self {
        match side {
            ListSide::Queued => JobListView::Queued,
            ListSide::History => JobListView::History,
        }
    }
}

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// List job executions
    List {
        /// Page through queued or finished jobs instead of listing all of them
        #[arg(long, value_enum)]
        view: Option<ListSide>,
        #[arg(long)]
        offset: Option<usize>,
        #[arg(long)]
        limit: Option<usize>,
        /// Display cap applied before paging
        #[arg(long)]
        max: Option<usize>,
    },
    /// Show grouped queued and finished counts
    Summary {
        #[arg(long)]
        max: Option<usize>,
    },
    /// Get job details
    Get { id: String },
    /// Cancel an active job
    Cancel { id: String },
    /// Queue a fresh copy of a job that has started
    Rerun { id: String },
    /// Delete a queued job
    Delete { id: String },
    /// Show which failed dependency blocked a job
    BlockedBy { id: String },
    /// List uploaded artifacts
    Artifacts { id: String },
    /// Download artifacts as a ZIP archive
    Download {
        id: String,
        /// Only include artifacts under this directory
        #[arg(long)]
        prefix: Option<String>,
        /// Where to write the archive
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show the test report
    Tests { id: String },
}

/// Handle job commands
///
/// Routes job subcommands to their respective handlers.
///
/// # Arguments
/// * `command` - The job command to execute
/// * `config` - The CLI configuration
pub async fn handle_job_command(command: JobCommands, config: &Config) -> Result<()> {
    let client = CiwiClient::new(&config.server_url);

    match command {
        JobCommands::List {
            view,
            offset,
            limit,
            max,
        } => list_jobs(&client, view, offset, limit, max).await,
        JobCommands::Summary { max } => show_summary(&client, max).await,
        JobCommands::Get { id } => get_job(&client, &id).await,
        JobCommands::Cancel { id } => cancel_job(&client, &id).await,
        JobCommands::Rerun { id } => rerun_job(&client, &id).await,
        JobCommands::Delete { id } => delete_job(&client, &id).await,
        JobCommands::BlockedBy { id } => blocked_by(&client, &id).await,
        JobCommands::Artifacts { id } => list_artifacts(&client, &id).await,
        JobCommands::Download { id, prefix, output } => {
            download_artifacts(&client, &id, prefix.as_deref(), output).await
        }
        JobCommands::Tests { id } => show_tests(&client, &id).await,
    }
}

async fn list_jobs(
    client: &CiwiClient,
    view: Option<ListSide>,
    offset: Option<usize>,
    limit: Option<usize>,
    max: Option<usize>,
) -> Result<()> {
    let jobs = match view {
        Some(side) => {
            let page = client
                .list_jobs_page(side.into(), offset, limit, max)
                .await
                .context("Failed to list jobs")?;
            println!(
                "{}",
                format!(
                    "{} jobs {}-{} of {}:",
                    page.view,
                    page.offset,
                    page.offset + page.job_executions.len(),
                    page.total
                )
                .bold()
            );
            page.job_executions
        }
        None => client.list_jobs().await.context("Failed to list jobs")?,
    };

    if jobs.is_empty() {
        println!("{}", "No jobs found.".yellow());
        return Ok(());
    }

    if view.is_none() {
        println!("{}", format!("Found {} job(s):", jobs.len()).bold());
    }
    println!();
    for job in &jobs {
        print_job_summary(job);
    }

    Ok(())
}

async fn show_summary(client: &CiwiClient, max: Option<usize>) -> Result<()> {
    let summary = client
        .jobs_summary(max)
        .await
        .context("Failed to fetch the job summary")?;

    println!(
        "{} queued, {} finished ({} total, capped at {})",
        summary.queued_count.to_string().yellow(),
        summary.history_count.to_string().green(),
        summary.total,
        summary.max
    );

    print_groups("Queued", &summary.queued_groups);
    print_groups("History", &summary.history_groups);

    Ok(())
}

fn print_groups(title: &str, groups: &[DisplayGroupSummary]) {
    if groups.is_empty() {
        return;
    }

    println!("\n{}", format!("{}:", title).bold());
    for group in groups {
        let label = match &group.run_id {
            Some(run_id) => format!("run {}", run_id),
            None => group.key.clone(),
        };
        let marker = if group.collapsible { "▾" } else { "▸" };
        println!(
            "  {} {} ({} job(s))",
            marker.cyan(),
            label,
            group.job_count
        );
    }
}

async fn get_job(client: &CiwiClient, id: &str) -> Result<()> {
    let job = client
        .get_job(id)
        .await
        .with_context(|| format!("Failed to get job {}", id))?;
    print_job_details(&job);
    Ok(())
}

async fn cancel_job(client: &CiwiClient, id: &str) -> Result<()> {
    let job = client
        .cancel_job(id)
        .await
        .with_context(|| format!("Failed to cancel job {}", id))?;
    println!(
        "{} Job {} is now {}",
        "✓".green(),
        job.id.cyan(),
        colorize_status(&job.status)
    );
    Ok(())
}

async fn rerun_job(client: &CiwiClient, id: &str) -> Result<()> {
    let job = client
        .rerun_job(id)
        .await
        .with_context(|| format!("Failed to rerun job {}", id))?;
    println!("{} Queued rerun {}", "✓".green(), job.id.cyan());
    Ok(())
}

async fn delete_job(client: &CiwiClient, id: &str) -> Result<()> {
    let deleted = client
        .delete_job(id)
        .await
        .with_context(|| format!("Failed to delete job {}", id))?;
    println!(
        "{} Deleted job {}",
        "✓".green(),
        deleted.job_execution_id.cyan()
    );
    Ok(())
}

async fn blocked_by(client: &CiwiClient, id: &str) -> Result<()> {
    let view = client
        .blocked_by(id)
        .await
        .with_context(|| format!("Failed to inspect job {}", id))?;

    if !view.blocked {
        println!("{}", "Job is not blocked by a dependency.".green());
        return Ok(());
    }

    println!("{}", "Blocked by:".bold());
    if let Some(kind) = &view.kind {
        println!("  Kind:       {}", kind);
    }
    if let Some(target) = &view.target {
        println!("  Target:     {}", target.yellow());
    }
    if let Some(dependency) = &view.dependency {
        println!("  Job:        {}", dependency.job_execution_id.cyan());
        if !dependency.pipeline_job_id.is_empty() {
            println!("  Pipeline:   {}", dependency.pipeline_job_id);
        }
        if !dependency.matrix_name.is_empty() {
            println!("  Matrix:     {}", dependency.matrix_name);
        }
        if !dependency.reason.is_empty() {
            println!("  Reason:     {}", dependency.reason.red());
        }
    }

    Ok(())
}

async fn list_artifacts(client: &CiwiClient, id: &str) -> Result<()> {
    let artifacts = client
        .list_artifacts(id)
        .await
        .with_context(|| format!("Failed to list artifacts of job {}", id))?;

    if artifacts.is_empty() {
        println!("{}", "No artifacts uploaded.".yellow());
    } else {
        println!(
            "{}",
            format!("Found {} artifact(s):", artifacts.len()).bold()
        );
        for artifact in &artifacts {
            print_artifact(artifact);
        }
    }

    Ok(())
}

fn print_artifact(artifact: &JobExecutionArtifact) {
    println!(
        "  {} {} {}",
        "▸".cyan(),
        artifact.path,
        format_size(artifact.size_bytes).dimmed()
    );
}

async fn download_artifacts(
    client: &CiwiClient,
    id: &str,
    prefix: Option<&str>,
    output: Option<PathBuf>,
) -> Result<()> {
    let bytes = client
        .download_artifacts(id, prefix)
        .await
        .with_context(|| format!("Failed to download artifacts of job {}", id))?;

    let output = output.unwrap_or_else(|| PathBuf::from(default_archive_name(id, prefix)));
    tokio::fs::write(&output, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{} Wrote {} to {}",
        "✓".green(),
        format_size(bytes.len() as u64),
        output.display().to_string().cyan()
    );
    Ok(())
}

async fn show_tests(client: &CiwiClient, id: &str) -> Result<()> {
    let report = client
        .get_tests(id)
        .await
        .with_context(|| format!("Failed to get the test report of job {}", id))?;

    match report {
        Some(report) => print_test_report(&report),
        None => println!("{}", "No test report uploaded.".yellow()),
    }
    Ok(())
}

fn print_test_report(report: &JobExecutionTestReport) {
    println!("{}", "Test Report:".bold());
    println!(
        "  {} passed, {} failed, {} skipped ({} total)",
        report.passed.to_string().green(),
        report.failed.to_string().red(),
        report.skipped.to_string().dimmed(),
        report.total
    );

    for suite in &report.suites {
        println!(
            "  {} {} {}/{}",
            "▸".cyan(),
            suite.name,
            suite.passed,
            suite.total
        );
        for case in suite.cases.iter().filter(|case| case.status == "fail") {
            println!("      {} {}", "✗".red(), case.name);
        }
    }

    if let Some(coverage) = &report.coverage {
        println!(
            "  Coverage: {:.1}% ({}/{} statements)",
            coverage.percent, coverage.covered_statements, coverage.total_statements
        );
    }
}

/// Print a one-entry summary of a job
fn print_job_summary(job: &JobExecution) {
    println!("  {} Job {}", "▸".cyan(), job.id.dimmed());
    println!("    Status:   {}", colorize_status(&job.status));
    println!(
        "    Created:  {}",
        job.created_utc
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    if !job.leased_by_agent_id.is_empty() {
        println!("    Agent:    {}", job.leased_by_agent_id.dimmed());
    }
    if !job.current_step.is_empty() {
        println!("    Step:     {}", job.current_step);
    }
    println!();
}

/// Print detailed job information
fn print_job_details(job: &JobExecution) {
    println!("{}", "Job Details:".bold());
    println!("  ID:          {}", job.id.cyan());
    println!("  Status:      {}", colorize_status(&job.status));
    println!(
        "  Created:     {}",
        job.created_utc.format("%Y-%m-%d %H:%M:%S")
    );

    if let Some(started) = job.started_utc {
        println!("  Started:     {}", started.format("%Y-%m-%d %H:%M:%S"));
    }

    if let Some(finished) = job.finished_utc {
        println!("  Finished:    {}", finished.format("%Y-%m-%d %H:%M:%S"));

        if let Some(started) = job.started_utc {
            let seconds = finished.signed_duration_since(started).num_seconds();
            println!("  Duration:    {}s", seconds);
        }
    }

    if !job.leased_by_agent_id.is_empty() {
        println!("  Agent:       {}", job.leased_by_agent_id);
    }
    if let Some(exit_code) = job.exit_code {
        println!("  Exit Code:   {}", exit_code);
    }
    if let Some(summary) = &job.test_summary {
        println!(
            "  Tests:       {} passed, {} failed, {} skipped",
            summary.passed, summary.failed, summary.skipped
        );
    }

    if !job.metadata.is_empty() {
        println!("\n{}", "Metadata:".bold());
        for (key, value) in &job.metadata {
            println!("  {} = {}", key.cyan(), value);
        }
    }

    if !job.unmet_requirements.is_empty() {
        println!("\n{}", "Unmet Requirements:".bold());
        for requirement in &job.unmet_requirements {
            println!("  {}", requirement.yellow());
        }
    }

    if !job.error.is_empty() {
        println!("\n{}", "Error:".bold());
        println!("{}", job.error.red());
    }

    if !job.output.is_empty() {
        println!("\n{}", "Output:".bold());
        println!("{}", job.output);
    }
}

/// Colorize job status for display
fn colorize_status(status: &JobExecutionStatus) -> ColoredString {
    let status_str = status.as_str();
    match status {
        JobExecutionStatus::Queued => status_str.yellow(),
        JobExecutionStatus::Leased => status_str.blue(),
        JobExecutionStatus::Running => status_str.cyan(),
        JobExecutionStatus::Succeeded => status_str.green(),
        JobExecutionStatus::Failed => status_str.red(),
    }
}

fn default_archive_name(job_id: &str, prefix: Option<&str>) -> String {
    let prefix = prefix
        .map(|p| p.trim_matches('/').replace('/', "-"))
        .filter(|p| !p.is_empty());
    match prefix {
        Some(prefix) => format!("{}-{}-artifacts.zip", job_id, prefix),
        None => format!("{}-artifacts.zip", job_id),
    }
}

fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_archive_name() {
        assert_eq!(default_archive_name("job-1", None), "job-1-artifacts.zip");
        assert_eq!(
            default_archive_name("job-1", Some("dist/linux/")),
            "job-1-dist-linux-artifacts.zip"
        );
        assert_eq!(default_archive_name("job-1", Some("/")), "job-1-artifacts.zip");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(12), "12 B");
        assert_eq!(format_size(2048), "2.0 KiB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MiB");
    }

    #[test]
    fn test_list_side_maps_to_client_view() {
        assert_eq!(JobListView::from(ListSide::Queued), JobListView::Queued);
        assert_eq!(JobListView::from(ListSide::History), JobListView::History);
    }
}
