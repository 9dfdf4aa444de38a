//! Display shaping of job listings
//!
//! Pure functions that keep UI listings bounded without splitting the jobs
//! of one pipeline run across pages. All of them preserve input order.

use std::collections::{HashMap, HashSet};

use ciwi_core::domain::job::JobExecution;
use ciwi_core::domain::metadata;
use ciwi_core::dto::view::DisplayGroupSummary;

pub const DEFAULT_DISPLAY_MAX: usize = 150;
pub const MAX_DISPLAY_MAX: usize = 2000;
pub const DEFAULT_PAGE_LIMIT: usize = 50;
pub const MAX_PAGE_LIMIT: usize = 200;
pub const MAX_PAGE_OFFSET: usize = 1_000_000;

/// Splits jobs into (active, terminal), keeping their order
pub fn split_by_state(jobs: &[JobExecution]) -> (Vec<JobExecution>, Vec<JobExecution>) {
    jobs.iter().cloned().partition(JobExecution::is_active)
}

/// `run_id|project|pipeline_id` of a job, or an empty string when it has no run id
///
/// The project part prefers `project_id` and falls back to `project`.
pub fn run_group_id(job: &JobExecution) -> String {
    let run_id = job.metadata_value(metadata::PIPELINE_RUN_ID);
    if run_id.is_empty() {
        return String::new();
    }

    let mut project = job.metadata_value(metadata::PROJECT_ID);
    if project.is_empty() {
        project = job.metadata_value(metadata::PROJECT);
    }

    format!(
        "{}|{}|{}",
        run_id,
        project,
        job.metadata_value(metadata::PIPELINE_ID)
    )
}

/// Key of the unit a job is displayed in: its run group, or the job alone
fn display_unit_key(job: &JobExecution) -> String {
    let group = run_group_id(job);
    if group.is_empty() {
        format!("job:{}", job.id)
    } else {
        format!("run:{}", group)
    }
}

/// Caps a listing at roughly `max` jobs without splitting run groups
///
/// Units are decided the first time they are seen, in input order. A unit
/// is dropped when it would push an already non-empty selection past
/// `max`, so the first unit is always kept even when it alone is larger.
/// Later, smaller units may still fit after a larger one was dropped.
/// A `max` of zero disables capping.
pub fn cap_display_jobs(jobs: &[JobExecution], max: usize) -> Vec<JobExecution> {
    if max == 0 {
        return jobs.to_vec();
    }

    let keys: Vec<String> = jobs.iter().map(display_unit_key).collect();

    let mut unit_sizes: HashMap<&str, usize> = HashMap::new();
    for key in &keys {
        *unit_sizes.entry(key.as_str()).or_default() += 1;
    }

    let mut decided: HashSet<&str> = HashSet::new();
    let mut included: HashSet<&str> = HashSet::new();
    let mut size = 0usize;

    for key in &keys {
        let key = key.as_str();
        if !decided.insert(key) {
            continue;
        }

        let unit_size = unit_sizes.get(key).copied().unwrap_or(1);
        if size > 0 && (size >= max || size + unit_size > max) {
            continue;
        }

        included.insert(key);
        size += unit_size;
    }

    jobs.iter()
        .zip(&keys)
        .filter(|(_, key)| included.contains(key.as_str()))
        .map(|(job, _)| job.clone())
        .collect()
}

/// One display row per single job or per multi-job run group, in first-seen order
pub fn summarize_display_groups(jobs: &[JobExecution]) -> Vec<DisplayGroupSummary> {
    let groups: Vec<String> = jobs.iter().map(run_group_id).collect();

    let mut group_sizes: HashMap<&str, usize> = HashMap::new();
    for group in groups.iter().filter(|group| !group.is_empty()) {
        *group_sizes.entry(group.as_str()).or_default() += 1;
    }

    let mut emitted: HashSet<&str> = HashSet::new();
    let mut summaries = Vec::new();

    for (job, group) in jobs.iter().zip(&groups) {
        let group_size = group_sizes.get(group.as_str()).copied().unwrap_or(0);

        if group.is_empty() || group_size == 1 {
            summaries.push(DisplayGroupSummary {
                key: format!("job:{}", job.id),
                run_id: None,
                job_count: 1,
                collapsible: false,
            });
            continue;
        }

        if emitted.insert(group.as_str()) {
            summaries.push(DisplayGroupSummary {
                key: format!("run:{}", group),
                run_id: Some(group.clone()),
                job_count: group_size,
                collapsible: true,
            });
        }
    }

    summaries
}

/// Copy of `jobs[offset..offset + limit]`, clipped to the list; empty past the end
pub fn paginate(jobs: &[JobExecution], offset: usize, limit: usize) -> Vec<JobExecution> {
    if offset >= jobs.len() {
        return Vec::new();
    }
    let end = offset.saturating_add(limit).min(jobs.len());
    jobs[offset..end].to_vec()
}

// =============================================================================
// Query Parameter Clamping
// =============================================================================

fn parse_param(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
}

/// `max` query parameter clamped to `[1, 2000]`, defaulting to 150
pub fn clamp_max(raw: Option<&str>) -> usize {
    match parse_param(raw) {
        Some(max) => max.clamp(1, MAX_DISPLAY_MAX as i64) as usize,
        None => DEFAULT_DISPLAY_MAX,
    }
}

/// `offset` query parameter clamped to `[0, 1_000_000]`, defaulting to 0
pub fn clamp_offset(raw: Option<&str>) -> usize {
    match parse_param(raw) {
        Some(offset) => offset.clamp(0, MAX_PAGE_OFFSET as i64) as usize,
        None => 0,
    }
}

/// `limit` query parameter clamped to `[1, 200]`, defaulting to 50
pub fn clamp_limit(raw: Option<&str>) -> usize {
    match parse_param(raw) {
        Some(limit) => limit.clamp(1, MAX_PAGE_LIMIT as i64) as usize,
        None => DEFAULT_PAGE_LIMIT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ciwi_core::domain::job::JobExecutionStatus;
    use std::collections::BTreeMap;

    fn build_job(id: &str, status: JobExecutionStatus, run: Option<(&str, &str, &str)>) -> JobExecution {
        let mut metadata = BTreeMap::new();
        if let Some((run_id, project, pipeline)) = run {
            metadata.insert(metadata::PIPELINE_RUN_ID.to_string(), run_id.to_string());
            metadata.insert(metadata::PROJECT.to_string(), project.to_string());
            metadata.insert(metadata::PIPELINE_ID.to_string(), pipeline.to_string());
        }
        JobExecution {
            id: id.to_string(),
            status,
            metadata,
            ..Default::default()
        }
    }

    fn ids(jobs: &[JobExecution]) -> Vec<&str> {
        jobs.iter().map(|job| job.id.as_str()).collect()
    }

    #[test]
    fn test_split_preserves_order() {
        let jobs = vec![
            build_job("h-1", JobExecutionStatus::Failed, None),
            build_job("q-1", JobExecutionStatus::Queued, None),
            build_job("r-1", JobExecutionStatus::Running, None),
            build_job("h-2", JobExecutionStatus::Succeeded, None),
            build_job("l-1", JobExecutionStatus::Leased, None),
        ];

        let (active, terminal) = split_by_state(&jobs);

        assert_eq!(ids(&active), vec!["q-1", "r-1", "l-1"]);
        assert_eq!(ids(&terminal), vec!["h-1", "h-2"]);
    }

    #[test]
    fn test_run_group_id_prefers_project_id() {
        let mut job = build_job("a", JobExecutionStatus::Queued, Some(("run-a", "p1", "build")));
        assert_eq!(run_group_id(&job), "run-a|p1|build");

        job.metadata
            .insert(metadata::PROJECT_ID.to_string(), "42".to_string());
        assert_eq!(run_group_id(&job), "run-a|42|build");

        job.metadata.remove(metadata::PIPELINE_RUN_ID);
        assert_eq!(run_group_id(&job), "");
    }

    #[test]
    fn test_cap_keeps_groups_whole() {
        let run = Some(("run-a", "p1", "build"));
        let jobs = vec![
            build_job("q-1", JobExecutionStatus::Queued, run),
            build_job("q-2", JobExecutionStatus::Running, run),
            build_job("h-1", JobExecutionStatus::Failed, None),
            build_job("h-2", JobExecutionStatus::Succeeded, None),
        ];

        assert_eq!(ids(&cap_display_jobs(&jobs, 3)), vec!["q-1", "q-2", "h-1"]);
        assert_eq!(ids(&cap_display_jobs(&jobs, 1)), vec!["q-1", "q-2"]);
        assert_eq!(cap_display_jobs(&jobs, 10).len(), 4);
    }

    #[test]
    fn test_cap_skips_large_group_but_keeps_later_small_units() {
        let run = Some(("run-b", "p1", "build"));
        let jobs = vec![
            build_job("a", JobExecutionStatus::Failed, None),
            build_job("b-1", JobExecutionStatus::Failed, run),
            build_job("c", JobExecutionStatus::Failed, None),
            build_job("b-2", JobExecutionStatus::Failed, run),
            build_job("b-3", JobExecutionStatus::Failed, run),
        ];

        assert_eq!(ids(&cap_display_jobs(&jobs, 3)), vec!["a", "c"]);
        assert_eq!(ids(&cap_display_jobs(&jobs, 4)), vec!["a", "b-1", "b-2", "b-3"]);
    }

    #[test]
    fn test_summarize_groups() {
        let run_a = Some(("run-a", "p1", "build"));
        let run_solo = Some(("run-z", "p1", "build"));
        let jobs = vec![
            build_job("q-1", JobExecutionStatus::Queued, run_a),
            build_job("x", JobExecutionStatus::Queued, None),
            build_job("q-2", JobExecutionStatus::Running, run_a),
            build_job("solo", JobExecutionStatus::Queued, run_solo),
        ];

        let groups = summarize_display_groups(&jobs);

        let keys: Vec<_> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["run:run-a|p1|build", "job:x", "job:solo"]);
        assert_eq!(groups[0].job_count, 2);
        assert!(groups[0].collapsible);
        assert_eq!(groups[0].run_id.as_deref(), Some("run-a|p1|build"));
        assert!(!groups[2].collapsible);
        assert_eq!(
            groups.iter().map(|g| g.job_count).sum::<usize>(),
            jobs.len()
        );
    }

    #[test]
    fn test_paginate() {
        let jobs: Vec<_> = (0..5)
            .map(|i| build_job(&format!("j-{}", i), JobExecutionStatus::Failed, None))
            .collect();

        assert_eq!(ids(&paginate(&jobs, 1, 2)), vec!["j-1", "j-2"]);
        assert_eq!(ids(&paginate(&jobs, 3, 200)), vec!["j-3", "j-4"]);
        assert!(paginate(&jobs, 5, 10).is_empty());
        assert!(paginate(&jobs, 99, 10).is_empty());
        assert_eq!(paginate(&jobs, 0, usize::MAX).len(), 5);
    }

    #[test]
    fn test_clamping() {
        assert_eq!(clamp_offset(Some("-5")), 0);
        assert_eq!(clamp_offset(Some("5000000")), MAX_PAGE_OFFSET);
        assert_eq!(clamp_offset(None), 0);
        assert_eq!(clamp_limit(Some("1000")), 200);
        assert_eq!(clamp_limit(Some("0")), 1);
        assert_eq!(clamp_limit(Some("abc")), DEFAULT_PAGE_LIMIT);
        assert_eq!(clamp_max(None), 150);
        assert_eq!(clamp_max(Some("99999")), 2000);
        assert_eq!(clamp_max(Some("3")), 3);
    }
}
