//! Test run reports

use serde::{Deserialize, Serialize};

/// Outcome of one target file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResult {
    pub file: String,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// Result of a run-tests request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    #[serde(default)]
    pub results: Vec<FileResult>,
    /// `Error: <message>` when the run itself could not complete
    #[serde(default)]
    pub error: Option<String>,
}

impl TestReport {
    /// Aggregate per-file results
    pub fn from_results(results: Vec<FileResult>, duration_ms: u64) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            duration_ms,
            results,
            error: None,
        }
    }

    /// Report standing in for a run that failed before producing results
    pub fn from_error(message: impl std::fmt::Display) -> Self {
        Self {
            error: Some(format!("Error: {}", message)),
            ..Default::default()
        }
    }

    pub fn success(&self) -> bool {
        self.error.is_none() && self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(file: &str, success: bool) -> FileResult {
        FileResult {
            file: file.to_string(),
            success,
            duration_ms: 1,
            output: String::new(),
            error: None,
        }
    }

    #[test]
    fn test_aggregate_counts() {
        let results = vec![result("a.js", true), result("b.js", false)];
        let report = TestReport::from_results(results, 10);
        assert_eq!(report.total, 2);
        assert_eq!(report.passed, 1);
        assert_eq!(report.failed, 1);
        assert!(!report.success());
    }

    #[test]
    fn test_error_report_signals_failure() {
        let report = TestReport::from_error("browser crashed");
        assert_eq!(report.error.as_deref(), Some("Error: browser crashed"));
        assert!(!report.success());
    }
}
