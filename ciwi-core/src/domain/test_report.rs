//! Test and coverage report types

use serde::{Deserialize, Serialize};

use crate::domain::job::JobExecutionTestSummary;

/// Parsed test results uploaded by an agent after a job's test steps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobExecutionTestReport {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suites: Vec<TestSuiteReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageReport>,
}

impl JobExecutionTestReport {
    pub fn summary(&self) -> JobExecutionTestSummary {
        JobExecutionTestSummary {
            total: self.total,
            passed: self.passed,
            failed: self.failed,
            skipped: self.skipped,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestSuiteReport {
    pub name: String,
    #[serde(default)]
    pub format: String,
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cases: Vec<TestCase>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub package: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub duration_seconds: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output: String,
}

/// Statement coverage attached to a test report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub format: String,
    pub total_statements: u64,
    pub covered_statements: u64,
    pub percent: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<CoverageFileReport>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageFileReport {
    pub path: String,
    pub total_statements: u64,
    pub covered_statements: u64,
    pub percent: f64,
}
