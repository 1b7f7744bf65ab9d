//! Puppetry host process
//!
//! Serves editor connections over a Unix socket: dialogs, project file
//! watching, runtime installation and test execution.

pub mod config;
pub mod dialogs;
pub mod dispatcher;
pub mod server;
pub mod service;
pub mod watcher;
pub mod windows;

pub use config::HostConfig;
pub use dialogs::{Dialogs, ModalDialogs, TerminalDialogs};
#[cfg(any(test, feature = "test-support"))]
pub use dialogs::{ScriptedAnswer, ScriptedDialogs};
pub use dispatcher::ExecutionDispatcher;
pub use server::HostServer;
pub use service::{HostContext, HostService};
pub use watcher::ProjectFileWatcher;
pub use windows::{WindowRegistry, WindowRole};
