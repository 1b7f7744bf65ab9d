//! Puppetry Common Library
//!
//! Suite document model, editor/host channel protocol and persistence shared
//! by the Puppetry editor and host processes.

pub mod channel;
pub mod error;
pub mod ordered;
pub mod persistence;
pub mod protocol;
pub mod report;
pub mod suite;
pub mod types;
pub mod validate;

// Re-export commonly used types
pub use channel::{Channel, EventBus, Peer, Responder, Subscription};
pub use error::{EntityKind, Error, Result};
pub use ordered::OrderedMap;
pub use protocol::{DialogChoice, Event, EventTopic, Frame, Reply, Request};
pub use report::{FileResult, TestReport};
pub use types::*;

/// Puppetry version, stamped into saved documents
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Per-user data directory
pub fn default_store_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".puppetry")
}

/// Default socket path for the host process
pub fn default_socket_path() -> std::path::PathBuf {
    default_store_path().join("host.sock")
}

/// Editor settings file
pub fn default_settings_path() -> std::path::PathBuf {
    default_store_path().join("settings.json")
}

/// Where the browser-automation runtime gets installed
pub fn default_runtime_test_path() -> std::path::PathBuf {
    default_store_path().join("runtime-test")
}

/// Home directory helper
mod dirs {
    pub fn home_dir() -> Option<std::path::PathBuf> {
        std::env::var_os("HOME").map(std::path::PathBuf::from)
    }
}
