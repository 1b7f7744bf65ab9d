//! Node backend tests
//!
//! Uses `/bin/sh` as the interpreter so the suite runs without Node.js.

use std::path::Path;
use std::time::Duration;

use puppetry_runtime::{NodeBackend, NodeConfig, RuntimeError, TestBackend};
use tempfile::TempDir;
use test_case::test_case;

fn shell_backend(timeout: Duration) -> NodeBackend {
    NodeBackend::new(NodeConfig {
        node_binary: "/bin/sh".to_string(),
        timeout,
        env: vec![("PUPPETRY_TEST".into(), "1".into())],
    })
}

fn script(dir: &Path, name: &str, body: &str) -> String {
    std::fs::write(dir.join(name), body).unwrap();
    name.to_string()
}

#[test_case("exit 0", true ; "zero exit passes")]
#[test_case("echo boom >&2; exit 3", false ; "non zero exit fails")]
#[test_case("echo '{\"success\":false,\"error\":\"assertion\"}'", false ; "reported failure wins")]
#[test_case("echo '{\"success\":true}'; exit 0", true ; "reported success")]
#[test_case("echo '{\"success\":true}'; exit 1", false ; "reported success with failed exit")]
#[tokio::test]
async fn test_file_outcome(body: &str, expected: bool) {
    let dir = TempDir::new().unwrap();
    let file = script(dir.path(), "case.js", body);

    let report = shell_backend(Duration::from_secs(10))
        .run(dir.path(), &[file])
        .await
        .unwrap();
    assert_eq!(report.total, 1);
    assert_eq!(report.results[0].success, expected);
    assert_eq!(report.success(), expected);
}

#[tokio::test]
async fn test_report_aggregates_files_in_order() {
    let dir = TempDir::new().unwrap();
    let files = vec![
        script(dir.path(), "a.js", "exit 0"),
        script(dir.path(), "b.js", "echo broken >&2; exit 1"),
        script(dir.path(), "c.js", "test \"$PUPPETRY_TEST\" = 1"),
    ];

    let report = shell_backend(Duration::from_secs(10)).run(dir.path(), &files).await.unwrap();
    assert_eq!(report.total, 3);
    assert_eq!(report.passed, 2);
    assert_eq!(report.failed, 1);
    let order: Vec<_> = report.results.iter().map(|r| r.file.as_str()).collect();
    assert_eq!(order, vec!["a.js", "b.js", "c.js"]);
    assert_eq!(report.results[1].error.as_deref(), Some("broken"));
}

#[tokio::test]
async fn test_slow_file_times_out() {
    let dir = TempDir::new().unwrap();
    let file = script(dir.path(), "slow.js", "sleep 5");

    let report = shell_backend(Duration::from_millis(200)).run(dir.path(), &[file]).await.unwrap();
    assert_eq!(report.failed, 1);
    assert!(report.results[0].error.as_deref().unwrap_or_default().contains("Timeout"));
}

#[tokio::test]
async fn test_missing_interpreter_is_an_error() {
    let dir = TempDir::new().unwrap();
    let file = script(dir.path(), "a.js", "exit 0");
    let backend = NodeBackend::new(NodeConfig {
        node_binary: "puppetry-missing-node".into(),
        ..Default::default()
    });

    let err = backend.run(dir.path(), &[file]).await.unwrap_err();
    assert!(matches!(err, RuntimeError::NodeNotFound(_)));
    assert!(backend.check_node_installed().await.is_err());
}
