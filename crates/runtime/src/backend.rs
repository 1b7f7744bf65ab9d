//! Test backends
//!
//! A backend runs generated test files from a runtime-test directory and
//! reports per-file outcomes. [`NodeBackend`] runs each file with `node`.

use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use puppetry_common::{FileResult, TestReport};
use serde::Deserialize;
use tokio::process::Command as TokioCommand;
use tracing::{debug, error, info, warn};

use crate::error::{RuntimeError, RuntimeResult};

/// Runs target files and aggregates a report
#[async_trait]
pub trait TestBackend: Send + Sync {
    async fn run(&self, cwd: &Path, target_files: &[String]) -> RuntimeResult<TestReport>;
}

/// Node backend configuration
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Interpreter used for every target file
    pub node_binary: String,

    /// Per-file wall clock limit
    pub timeout: Duration,

    /// Extra environment for test processes
    pub env: Vec<(String, String)>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_binary: "node".to_string(),
            timeout: Duration::from_secs(300),
            env: Vec::new(),
        }
    }
}

/// Last stdout line a test file may print to report its own outcome
#[derive(Debug, Deserialize)]
struct Outcome {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

fn parse_outcome(stdout: &str) -> Option<Outcome> {
    let line = stdout.lines().rev().find(|l| !l.trim().is_empty())?;
    serde_json::from_str(line.trim()).ok()
}

/// Keep the tail of long diagnostics
fn tail(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

/// Resolve target files inside `cwd`, rejecting anything that escapes it
pub fn prepare(cwd: &Path, target_files: &[String]) -> RuntimeResult<Vec<PathBuf>> {
    if !cwd.is_dir() {
        return Err(RuntimeError::Preparation(format!(
            "working directory {} does not exist",
            cwd.display()
        )));
    }
    if target_files.is_empty() {
        return Err(RuntimeError::Preparation("no target files given".to_string()));
    }

    target_files
        .iter()
        .map(|file| {
            let relative = Path::new(file);
            let escapes = relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if file.trim().is_empty() || escapes {
                return Err(RuntimeError::Preparation(format!(
                    "target file `{}` must be a relative path inside {}",
                    file,
                    cwd.display()
                )));
            }
            let path = cwd.join(relative);
            if !path.is_file() {
                return Err(RuntimeError::Preparation(format!(
                    "target file {} not found",
                    path.display()
                )));
            }
            Ok(path)
        })
        .collect()
}

/// Runs each target file as `node <file>` inside the runtime-test directory
pub struct NodeBackend {
    config: NodeConfig,
}

impl NodeBackend {
    pub fn new(config: NodeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Check the interpreter can be started
    pub async fn check_node_installed(&self) -> RuntimeResult<()> {
        let status = TokioCommand::new(&self.config.node_binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(RuntimeError::NodeNotFound(self.config.node_binary.clone())),
        }
    }

    async fn run_file(&self, cwd: &Path, file: &str, path: &Path) -> RuntimeResult<FileResult> {
        let start = Instant::now();
        debug!("Running {}", path.display());

        let child = TokioCommand::new(&self.config.node_binary)
            .arg(path)
            .current_dir(cwd)
            .envs(self.config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    RuntimeError::NodeNotFound(self.config.node_binary.clone())
                }
                _ => RuntimeError::Io(e),
            })?;
        let pid = child.id();

        let waited = tokio::time::timeout(self.config.timeout, child.wait_with_output()).await;
        let output = match waited {
            Ok(output) => output?,
            Err(_) => {
                #[cfg(unix)]
                if let Some(pid) = pid {
                    use nix::sys::signal::{kill, Signal};
                    use nix::unistd::Pid;

                    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                        warn!("Failed to terminate {} (pid {}): {}", file, pid, e);
                    }
                }
                let timeout = RuntimeError::Timeout {
                    file: file.to_string(),
                    secs: self.config.timeout.as_secs(),
                };
                return Ok(FileResult {
                    file: file.to_string(),
                    success: false,
                    duration_ms: start.elapsed().as_millis() as u64,
                    output: String::new(),
                    error: Some(timeout.to_string()),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        // A reported outcome may fail a clean exit but never passes a failed one
        let (success, error) = match parse_outcome(&stdout) {
            Some(outcome) if output.status.success() => (outcome.success, outcome.error),
            None if output.status.success() => (true, None),
            reported => {
                let reason = if !stderr.trim().is_empty() {
                    tail(&stderr, 20)
                } else if let Some(error) = reported.and_then(|outcome| outcome.error) {
                    error
                } else {
                    format!("exited with {}", output.status)
                };
                (false, Some(reason))
            }
        };

        Ok(FileResult {
            file: file.to_string(),
            success,
            duration_ms: start.elapsed().as_millis() as u64,
            output: stdout,
            error,
        })
    }
}

impl Default for NodeBackend {
    fn default() -> Self {
        Self::new(NodeConfig::default())
    }
}

#[async_trait]
impl TestBackend for NodeBackend {
    async fn run(&self, cwd: &Path, target_files: &[String]) -> RuntimeResult<TestReport> {
        let paths = prepare(cwd, target_files)?;
        let start = Instant::now();
        info!("Running {} test file(s)...", paths.len());

        let mut results = Vec::with_capacity(paths.len());
        for (file, path) in target_files.iter().zip(&paths) {
            let result = self.run_file(cwd, file, path).await?;
            if result.success {
                info!("✓ {} ({} ms)", result.file, result.duration_ms);
            } else {
                let reason = result.error.as_deref().unwrap_or("unknown error");
                error!("✗ {} - {}", result.file, reason);
            }
            results.push(result);
        }

        let report = TestReport::from_results(results, start.elapsed().as_millis() as u64);
        info!(
            "Test Results: {} passed, {} failed ({} ms)",
            report.passed, report.failed, report.duration_ms
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_outcome_uses_last_line() {
        let stdout = "starting\n{\"success\":false,\"error\":\"button missing\"}\n\n";
        let outcome = parse_outcome(stdout).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("button missing"));
        assert!(parse_outcome("plain log line").is_none());
    }

    #[test]
    fn test_prepare_rejects_escaping_paths() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("ok.js"), "").unwrap();

        assert!(prepare(dir.path(), &["ok.js".into()]).is_ok());
        assert!(matches!(
            prepare(dir.path(), &["../ok.js".into()]),
            Err(RuntimeError::Preparation(_))
        ));
        assert!(matches!(
            prepare(dir.path(), &["/etc/passwd".into()]),
            Err(RuntimeError::Preparation(_))
        ));
        assert!(matches!(
            prepare(dir.path(), &["missing.js".into()]),
            Err(RuntimeError::Preparation(_))
        ));
        assert!(matches!(prepare(dir.path(), &[]), Err(RuntimeError::Preparation(_))));
    }

    #[test]
    fn test_prepare_requires_cwd() {
        let err = prepare(Path::new("/definitely/not/here"), &["a.js".into()]).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_tail_keeps_last_lines() {
        assert_eq!(tail("a\nb\nc", 2), "b\nc");
        assert_eq!(tail("a", 5), "a");
    }
}
