//! Step marker protocol
//!
//! Agents run a job script as a sequence of steps. Before each step they
//! emit one marker line into the command stream so the server can tell
//! which step produced which output:
//!
//! ```text
//! __CIWI_STEP_BEGIN__ index=2 total=5 name=unit_tests kind=test test_name=unit test_format=go-test-json
//! ```
//!
//! Tokens never contain whitespace or double quotes, so a marker survives
//! every supported shell's `echo` unchanged. cmd gets no quotes, so its
//! metacharacters are caret-escaped instead.

use crate::domain::job::JobStepPlanItem;

/// Prefix every marker line starts with
pub const STEP_BEGIN_PREFIX: &str = "__CIWI_STEP_BEGIN__";

/// Shell family a marker is echoed through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Posix,
    Cmd,
    PowerShell,
}

impl Shell {
    /// Maps a configured shell name to its family; unknown names are POSIX
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "cmd" => Shell::Cmd,
            "powershell" | "pwsh" => Shell::PowerShell,
            _ => Shell::Posix,
        }
    }
}

/// Fields carried by a step marker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepMarker {
    pub index: u32,
    pub total: u32,
    pub name: String,
    pub kind: String,
    pub test_name: String,
    pub test_format: String,
    pub test_report: String,
}

impl From<&JobStepPlanItem> for StepMarker {
    fn from(step: &JobStepPlanItem) -> Self {
        StepMarker {
            index: step.index,
            total: step.total,
            name: step.name.clone(),
            kind: step.kind.clone(),
            test_name: step.test_name.clone(),
            test_format: step.test_format.clone(),
            test_report: step.test_report.clone(),
        }
    }
}

/// Renders the marker line itself, without any shell wrapping
pub fn marker_line(marker: &StepMarker) -> String {
    let mut name = sanitize_token(&marker.name);
    if name.is_empty() {
        name = format!("step_{}", marker.index);
    }

    let mut line = format!(
        "{} index={} total={} name={}",
        STEP_BEGIN_PREFIX, marker.index, marker.total, name
    );

    let optional = [
        ("kind", &marker.kind),
        ("test_name", &marker.test_name),
        ("test_format", &marker.test_format),
        ("test_report", &marker.test_report),
    ];
    for (key, value) in optional {
        let value = sanitize_token(value);
        if !value.is_empty() {
            line.push(' ');
            line.push_str(key);
            line.push('=');
            line.push_str(&value);
        }
    }

    line
}

/// Renders the shell command that prints the marker line
pub fn echo_command(shell: Shell, marker: &StepMarker) -> String {
    let line = marker_line(marker);
    match shell {
        Shell::Posix => format!("echo \"{}\"", line),
        Shell::Cmd => format!("echo {}", escape_cmd(&line)),
        Shell::PowerShell => format!("Write-Output \"{}\"", line),
    }
}

/// Recognises a marker line in captured output
pub fn parse_marker_line(line: &str) -> Option<StepMarker> {
    let rest = line.trim().strip_prefix(STEP_BEGIN_PREFIX)?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let mut marker = StepMarker::default();
    let mut saw_index = false;
    for token in rest.split_whitespace() {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        match key {
            "index" => {
                marker.index = value.parse().ok()?;
                saw_index = true;
            }
            "total" => marker.total = value.parse().ok()?,
            "name" => marker.name = value.to_string(),
            "kind" => marker.kind = value.to_string(),
            "test_name" => marker.test_name = value.to_string(),
            "test_format" => marker.test_format = value.to_string(),
            "test_report" => marker.test_report = value.to_string(),
            _ => {}
        }
    }

    saw_index.then_some(marker)
}

fn escape_cmd(line: &str) -> String {
    let mut escaped = String::with_capacity(line.len());
    for c in line.chars() {
        if matches!(c, '^' | '&' | '|' | '<' | '>' | '(' | ')') {
            escaped.push('^');
        }
        escaped.push(c);
    }
    escaped
}

fn sanitize_token(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|c| *c != '"')
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}
