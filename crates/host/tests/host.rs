//! Host service tests
//!
//! Connects an editor-side channel to a host over an in-memory stream, with
//! scripted dialogs and an in-process test backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use puppetry_common::{
    Channel, DialogChoice, Error, Event, EventTopic, FileResult, Reply, Request, TestReport,
};
use puppetry_host::{
    HostConfig, HostContext, HostServer, ModalDialogs, ScriptedAnswer, ScriptedDialogs, WindowRole,
};

use puppetry_runtime::{RuntimeResult, TestBackend};
use tempfile::TempDir;

struct FakeBackend;

#[async_trait]
impl TestBackend for FakeBackend {
    async fn run(&self, _cwd: &Path, target_files: &[String]) -> RuntimeResult<TestReport> {
        if target_files.iter().any(|f| f.contains("crash")) {
            panic!("Cannot read property 'click' of null");
        }
        let results = target_files
            .iter()
            .map(|file| FileResult {
                file: file.clone(),
                success: true,
                duration_ms: 3,
                output: String::new(),
                error: None,
            })
            .collect();
        Ok(TestReport::from_results(results, 3))
    }
}

struct Harness {
    editor: Channel,
    _host: Channel,
    server: HostServer,
    dialogs: Arc<ScriptedDialogs>,
}

fn harness() -> Harness {
    let mut config = HostConfig::default();
    config.watcher.settle_window_ms = 100;
    config.runtime.npm_binary = "puppetry-missing-npm".into();

    let dialogs = Arc::new(ScriptedDialogs::default());
    let ctx = Arc::new(HostContext::new(
        config,
        Arc::new(ModalDialogs::new(dialogs.clone())),
        Arc::new(FakeBackend),
    ));
    ctx.windows.open(WindowRole::Main);

    let server = HostServer::new(ctx);
    let (editor_io, host_io) = tokio::io::duplex(256 * 1024);
    let host = server.attach(host_io);
    let editor = Channel::open(editor_io, None);
    Harness { editor, _host: host, server, dialogs }
}

async fn next_event(sub: &mut puppetry_common::Subscription) -> Event {
    tokio::time::timeout(Duration::from_secs(5), sub.recv())
        .await
        .expect("event within timeout")
        .expect("subscription open")
}

#[tokio::test]
async fn test_browse_directory_replies_and_pushes() {
    let h = harness();
    h.dialogs.push(ScriptedAnswer::Directory(Some(PathBuf::from("/projects/shop"))));
    let mut selected = h.editor.subscribe(EventTopic::DirectorySelected, "browse");

    let reply = h.editor.request(Request::BrowseDirectory).await.unwrap();
    assert_eq!(reply, Reply::Selection(Some(PathBuf::from("/projects/shop"))));
    assert_eq!(
        next_event(&mut selected).await,
        Event::DirectorySelected { path: Some(PathBuf::from("/projects/shop")) }
    );
}

#[tokio::test]
async fn test_cancelled_file_picker_is_none() {
    let h = harness();
    h.dialogs.push(ScriptedAnswer::File(None));
    let reply = h
        .editor
        .request(Request::BrowseFile { default_path: Some(PathBuf::from("/projects")) })
        .await
        .unwrap();
    assert_eq!(reply, Reply::Selection(None));
}

#[tokio::test]
async fn test_confirm_unsaved_choice() {
    let h = harness();
    h.dialogs.push(ScriptedAnswer::Confirm(DialogChoice::Ignore));
    let reply = h
        .editor
        .request(Request::ConfirmUnsaved { runtime_test_directory: PathBuf::from("/rt") })
        .await
        .unwrap();
    assert_eq!(reply, Reply::Choice(DialogChoice::Ignore));
    assert_eq!(h.dialogs.remaining(), 0);
}

#[tokio::test]
async fn test_run_tests_contains_crash_and_keeps_serving() {
    let h = harness();
    let reply = h
        .editor
        .request(Request::RunTests { cwd: "/rt".into(), target_files: vec!["crash.js".into()] })
        .await
        .unwrap();
    let Reply::Report(report) = reply else { panic!("expected report") };
    assert_eq!(report.error.as_deref(), Some("Error: Cannot read property 'click' of null"));

    let reply = h
        .editor
        .request(Request::RunTests { cwd: "/rt".into(), target_files: vec!["login.js".into()] })
        .await
        .unwrap();
    let Reply::Report(report) = reply else { panic!("expected report") };
    assert!(report.success());
    assert_eq!(report.total, 1);
}

#[tokio::test]
async fn test_install_failure_is_surfaced() {
    let h = harness();
    let dir = TempDir::new().unwrap();
    let runtime_dir = dir.path().join("runtime-test");

    let err = h
        .editor
        .request(Request::InstallRuntimeTest { runtime_test_directory: runtime_dir.clone() })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Remote(ref m) if m.contains("puppetry-missing-npm")));
    assert!(!runtime_dir.exists(), "half-installed directory is removed");
}

#[tokio::test]
async fn test_watch_pushes_navigator_updates() {
    let h = harness();
    let project = TempDir::new().unwrap();
    let mut updates = h.editor.subscribe(EventTopic::FileNavigatorUpdated, "navigator");

    h.editor
        .request(Request::WatchProjectFiles { project_directory: project.path().to_path_buf() })
        .await
        .unwrap();
    std::fs::write(project.path().join("cart.json"), "{}").unwrap();

    assert_eq!(
        next_event(&mut updates).await,
        Event::FileNavigatorUpdated { project_directory: project.path().to_path_buf() }
    );
}

#[tokio::test]
async fn test_watch_missing_directory_is_error() {
    let h = harness();
    let err = h
        .editor
        .request(Request::WatchProjectFiles { project_directory: "/no/such/project".into() })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Remote(_)));
}

#[tokio::test]
async fn test_suite_loaded_sets_main_title() {
    let h = harness();
    h.editor
        .emit(Event::SuiteLoaded {
            project_directory: "/projects/shop".into(),
            filename: "cart.json".into(),
            files: vec!["cart.json".into()],
        })
        .unwrap();

    let windows = h.server.context().windows.clone();
    let mut title = String::new();
    for _ in 0..50 {
        title = windows.get(WindowRole::Main).unwrap().spec.title;
        if title != "Puppetry" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(title, "Puppetry: cart.json");
}

#[tokio::test]
async fn test_recorder_window_opens_once() {
    let h = harness();
    h.editor.request(Request::OpenRecorderWindow).await.unwrap();
    h.editor.request(Request::OpenRecorderWindow).await.unwrap();

    let windows = &h.server.context().windows;
    let recorder = windows.get(WindowRole::Recorder).unwrap();
    assert!(recorder.focused);
    assert_eq!(recorder.spec.title, "Puppetry Recorder");
}
