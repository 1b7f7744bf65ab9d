//! Typed client for the host process

use puppetry_common::{
    Channel, DialogChoice, Error, Event, EventTopic, Reply, Request, Result, Subscription,
    TestReport,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use tracing::debug;

/// Editor end of the editor/host channel
#[derive(Clone)]
pub struct HostClient {
    channel: Arc<Channel>,
}

fn unexpected(topic: &str, reply: Reply) -> Error {
    Error::Channel(format!("unexpected reply to `{}`: {:?}", topic, reply))
}

impl HostClient {
    /// Connect to a host listening on `socket_path`
    pub async fn connect(socket_path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(socket_path).await.map_err(|e| {
            Error::Channel(format!(
                "cannot reach host at {} ({}). Is puppetry-host running?",
                socket_path.display(),
                e
            ))
        })?;
        debug!("Connected to host at {}", socket_path.display());
        Ok(Self::from_stream(stream))
    }

    /// Wrap an already connected stream
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self {
            channel: Arc::new(Channel::open(stream, None)),
        }
    }

    async fn done(&self, request: Request) -> Result<()> {
        let topic = request.topic();
        match self.channel.request(request).await? {
            Reply::Done => Ok(()),
            other => Err(unexpected(topic, other)),
        }
    }

    async fn selection(&self, request: Request) -> Result<Option<PathBuf>> {
        let topic = request.topic();
        match self.channel.request(request).await? {
            Reply::Selection(path) => Ok(path),
            other => Err(unexpected(topic, other)),
        }
    }

    /// `None` when the user dismissed the picker
    pub async fn browse_directory(&self) -> Result<Option<PathBuf>> {
        self.selection(Request::BrowseDirectory).await
    }

    pub async fn browse_file(&self, default_path: Option<PathBuf>) -> Result<Option<PathBuf>> {
        self.selection(Request::BrowseFile { default_path }).await
    }

    pub async fn confirm_unsaved(&self, runtime_test_directory: PathBuf) -> Result<DialogChoice> {
        match self.channel.request(Request::ConfirmUnsaved { runtime_test_directory }).await? {
            Reply::Choice(choice) => Ok(choice),
            other => Err(unexpected("confirm-unsaved-dialog", other)),
        }
    }

    pub async fn install_runtime_test(&self, runtime_test_directory: PathBuf) -> Result<()> {
        self.done(Request::InstallRuntimeTest { runtime_test_directory }).await
    }

    pub async fn run_tests(&self, cwd: PathBuf, target_files: Vec<String>) -> Result<TestReport> {
        match self.channel.request(Request::RunTests { cwd, target_files }).await? {
            Reply::Report(report) => Ok(report),
            other => Err(unexpected("run-tests", other)),
        }
    }

    pub async fn watch_project_files(&self, project_directory: PathBuf) -> Result<()> {
        self.done(Request::WatchProjectFiles { project_directory }).await
    }

    pub async fn open_recorder_window(&self) -> Result<()> {
        self.done(Request::OpenRecorderWindow).await
    }

    /// Informational push to the host
    pub fn emit(&self, event: Event) -> Result<()> {
        self.channel.emit(event)
    }

    pub fn subscribe(&self, topic: EventTopic, key: &str) -> Subscription {
        self.channel.subscribe(topic, key)
    }

    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }
}
