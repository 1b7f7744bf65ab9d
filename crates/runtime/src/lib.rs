//! Puppetry browser-automation runtime
//!
//! Installs the Node runtime that generated suites depend on and runs test
//! files against it.

pub mod backend;
pub mod error;
pub mod install;

pub use backend::{NodeBackend, NodeConfig, TestBackend};
pub use error::{RuntimeError, RuntimeResult};
pub use install::RuntimeTestDir;
