//! Test execution dispatcher
//!
//! Runs test batches on the configured backend. Whatever goes wrong while
//! preparing or running, including a panic inside the backend, comes back as
//! a report carrying `Error: <message>`.

use puppetry_common::TestReport;
use puppetry_runtime::TestBackend;
use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

pub struct ExecutionDispatcher {
    backend: Arc<dyn TestBackend>,
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "test backend panicked".to_string()
    }
}

impl ExecutionDispatcher {
    pub fn new(backend: Arc<dyn TestBackend>) -> Self {
        Self { backend }
    }

    /// Run `target_files` in `cwd` and wait for the full report
    pub async fn run_tests(&self, cwd: PathBuf, target_files: Vec<String>) -> TestReport {
        info!("Dispatching {} file(s) in {}", target_files.len(), cwd.display());
        let backend = self.backend.clone();
        let run = tokio::spawn(async move { backend.run(&cwd, &target_files).await });

        match run.await {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                error!("Test run failed: {}", e);
                TestReport::from_error(e)
            }
            Err(e) if e.is_panic() => {
                let message = panic_message(e.into_panic());
                error!("Test run crashed: {}", message);
                TestReport::from_error(message)
            }
            Err(e) => {
                error!("Test run aborted: {}", e);
                TestReport::from_error(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use puppetry_common::FileResult;
    use puppetry_runtime::{RuntimeError, RuntimeResult};
    use std::path::Path;

    /// Panics on `explode.js`, fails to prepare on `missing.js`
    struct Flaky;

    #[async_trait]
    impl TestBackend for Flaky {
        async fn run(&self, _cwd: &Path, target_files: &[String]) -> RuntimeResult<TestReport> {
            if target_files.iter().any(|f| f == "explode.js") {
                panic!("element handle detached");
            }
            if target_files.iter().any(|f| f == "missing.js") {
                return Err(RuntimeError::Preparation("target file missing.js not found".into()));
            }
            let results = target_files
                .iter()
                .map(|file| FileResult {
                    file: file.clone(),
                    success: true,
                    duration_ms: 1,
                    output: String::new(),
                    error: None,
                })
                .collect();
            Ok(TestReport::from_results(results, 1))
        }
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let dispatcher = ExecutionDispatcher::new(Arc::new(Flaky));

        let report = dispatcher.run_tests("/rt".into(), vec!["explode.js".into()]).await;
        assert_eq!(report.error.as_deref(), Some("Error: element handle detached"));
        assert!(!report.success());

        let report = dispatcher.run_tests("/rt".into(), vec!["ok.js".into()]).await;
        assert!(report.success());
        assert_eq!(report.passed, 1);
    }

    #[tokio::test]
    async fn test_backend_error_becomes_report() {
        let dispatcher = ExecutionDispatcher::new(Arc::new(Flaky));
        let report = dispatcher.run_tests("/rt".into(), vec!["missing.js".into()]).await;
        let error = report.error.unwrap();
        assert!(error.starts_with("Error: "));
        assert!(error.contains("missing.js"));
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(7u8)), "test backend panicked");
    }
}
