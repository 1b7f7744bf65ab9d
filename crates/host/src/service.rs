//! Request handling for one editor connection

use crate::config::HostConfig;
use crate::dialogs::Dialogs;
use crate::dispatcher::ExecutionDispatcher;
use crate::watcher::ProjectFileWatcher;
use crate::windows::{Opened, WindowRegistry, WindowRole};
use async_trait::async_trait;
use parking_lot::Mutex;
use puppetry_common::{Error, Event, Peer, Reply, Request, Responder, Result};
use puppetry_runtime::{RuntimeTestDir, TestBackend};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Host-wide services shared by every connection
pub struct HostContext {
    pub config: HostConfig,
    pub dialogs: Arc<dyn Dialogs>,
    pub windows: Arc<WindowRegistry>,
    pub dispatcher: Arc<ExecutionDispatcher>,
}

impl HostContext {
    pub fn new(
        config: HostConfig,
        dialogs: Arc<dyn Dialogs>,
        backend: Arc<dyn TestBackend>,
    ) -> Self {
        let windows = Arc::new(WindowRegistry::new(config.dev_mode));
        Self {
            config,
            dialogs,
            windows,
            dispatcher: Arc::new(ExecutionDispatcher::new(backend)),
        }
    }
}

/// Responder for one editor connection. Owns that connection's watcher.
pub struct HostService {
    ctx: Arc<HostContext>,
    watcher: Mutex<ProjectFileWatcher>,
}

impl HostService {
    pub fn new(ctx: Arc<HostContext>) -> Self {
        let watcher = ProjectFileWatcher::new(ctx.config.settle_window());
        Self {
            ctx,
            watcher: Mutex::new(watcher),
        }
    }

    fn push(peer: &Peer, event: Event) {
        if let Err(e) = peer.emit(event) {
            debug!("Dropping push: {}", e);
        }
    }
}

#[async_trait]
impl Responder for HostService {
    async fn respond(&self, request: Request, peer: Peer) -> Result<Reply> {
        match request {
            Request::BrowseDirectory => {
                let path = self.ctx.dialogs.pick_directory().await?;
                Self::push(&peer, Event::DirectorySelected { path: path.clone() });
                Ok(Reply::Selection(path))
            }

            Request::BrowseFile { default_path } => {
                let path = self.ctx.dialogs.pick_file(default_path.as_deref()).await?;
                Self::push(&peer, Event::FileSelected { path: path.clone() });
                Ok(Reply::Selection(path))
            }

            Request::ConfirmUnsaved { runtime_test_directory } => {
                let choice = self.ctx.dialogs.confirm_unsaved(&runtime_test_directory).await?;
                Ok(Reply::Choice(choice))
            }

            Request::InstallRuntimeTest { runtime_test_directory } => {
                let runtime = RuntimeTestDir::new(runtime_test_directory);
                if let Err(e) = runtime.install(&self.ctx.config.runtime.npm_binary).await {
                    warn!("Runtime install failed: {}", e);
                    if let Err(cleanup) = runtime.remove().await {
                        warn!("Could not clean up {}: {}", runtime.path().display(), cleanup);
                    }
                    return Err(Error::Execution(e.to_string()));
                }
                Ok(Reply::Done)
            }

            Request::RunTests { cwd, target_files } => {
                let report = self.ctx.dispatcher.run_tests(cwd, target_files).await;
                Ok(Reply::Report(report))
            }

            Request::WatchProjectFiles { project_directory } => {
                let notify_peer = peer.clone();
                let directory = project_directory.clone();
                self.watcher.lock().watch(&project_directory, move || {
                    Self::push(
                        &notify_peer,
                        Event::FileNavigatorUpdated {
                            project_directory: directory.clone(),
                        },
                    );
                })?;
                Ok(Reply::Done)
            }

            Request::OpenRecorderWindow => {
                if self.ctx.windows.open(WindowRole::Recorder) == Opened::Focused {
                    info!("Recorder window already open, focused");
                }
                Ok(Reply::Done)
            }
        }
    }
}
