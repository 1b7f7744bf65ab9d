//! Host socket server
//!
//! Every editor connection gets its own channel and [`HostService`]; dialogs,
//! windows and the dispatcher are shared through [`HostContext`].

use crate::service::{HostContext, HostService};
use crate::windows::WindowRole;
use puppetry_common::{Channel, Event, EventTopic, Responder, Subscription};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;
use tracing::{debug, info, warn};

/// Subscription key for host-side observers
const OBSERVER: &str = "host";

#[derive(Clone)]
pub struct HostServer {
    ctx: Arc<HostContext>,
}

impl HostServer {
    pub fn new(ctx: Arc<HostContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<HostContext> {
        &self.ctx
    }

    /// Serve one editor over `stream`. Must be called inside a tokio runtime.
    pub fn attach<S>(&self, stream: S) -> Channel
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let service: Arc<dyn Responder> = Arc::new(HostService::new(self.ctx.clone()));
        let channel = Channel::open(stream, Some(service));

        let observed = [
            channel.subscribe(EventTopic::ProjectLoaded, OBSERVER),
            channel.subscribe(EventTopic::SuiteLoaded, OBSERVER),
            channel.subscribe(EventTopic::SuiteListUpdated, OBSERVER),
        ];
        for subscription in observed {
            tokio::spawn(observe(subscription, self.ctx.clone()));
        }
        channel
    }

    /// Accept editor connections until the listener fails
    pub async fn serve(&self, listener: UnixListener) -> anyhow::Result<()> {
        loop {
            let (stream, _) = listener.accept().await?;
            info!("Editor connected");
            let channel = self.attach(stream);
            tokio::spawn(async move {
                channel.closed().await;
                info!("Editor disconnected");
            });
        }
    }
}

/// Bind the host socket, replacing a stale socket file
pub fn bind(socket_path: &Path) -> anyhow::Result<UnixListener> {
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if socket_path.exists() {
        debug!("Removing stale socket {}", socket_path.display());
        std::fs::remove_file(socket_path)?;
    }
    let listener = UnixListener::bind(socket_path)?;
    info!("Host listening on {}", socket_path.display());
    Ok(listener)
}

/// Informational pushes from the editor
async fn observe(mut subscription: Subscription, ctx: Arc<HostContext>) {
    while let Some(event) = subscription.recv().await {
        match event {
            Event::ProjectLoaded { project_directory } => {
                info!("Project loaded: {}", project_directory.display());
            }
            Event::SuiteLoaded { project_directory, filename, files } => {
                info!(
                    "Suite loaded: {} ({} suite(s) in {})",
                    filename,
                    files.len(),
                    project_directory.display()
                );
                let title = format!("Puppetry: {}", filename);
                if let Err(e) = ctx.windows.set_title(WindowRole::Main, title) {
                    warn!("Cannot update window title: {}", e);
                }
            }
            Event::SuiteListUpdated { project_directory, files, .. } => {
                debug!("{} suite(s) in {}", files.len(), project_directory.display());
            }
            other => debug!("Ignoring {} push", other.topic()),
        }
    }
}
