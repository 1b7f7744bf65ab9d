//! Puppetry Editor
//!
//! Holds the open project and suite in a single-writer store and drives
//! load, save and run workflows against the persistence gateway and the
//! host process.

pub mod client;
pub mod commands;
pub mod output;
pub mod settings;
pub mod state;
pub mod store;
pub mod workflows;

pub use client::HostClient;
pub use settings::{Settings, SettingsStore};
pub use state::{AppState, AppTab, EditorState, ErrorBanner};
pub use store::{Action, Applied, Store, SuiteAction};
pub use workflows::Editor;
