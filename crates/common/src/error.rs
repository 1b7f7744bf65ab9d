//! Error types for Puppetry

use std::fmt;
use thiserror::Error;

/// Result type alias using Puppetry Error
pub type Result<T> = std::result::Result<T, Error>;

/// Kind of entity an id refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Target,
    Group,
    Test,
    Command,
    Window,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Target => write!(f, "target"),
            EntityKind::Group => write!(f, "group"),
            EntityKind::Test => write!(f, "test"),
            EntityKind::Command => write!(f, "command"),
            EntityKind::Window => write!(f, "window"),
        }
    }
}

/// Puppetry error types
#[derive(Error, Debug)]
pub enum Error {
    /// A mutation payload failed its shape contract
    #[error("Validation error: {0}")]
    Validation(String),

    /// A workflow precondition is missing (empty filename, directory, title)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {kind} with id {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("Duplicate id: {kind} with id {id} already exists")]
    DuplicateId { kind: EntityKind, id: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Channel error: {0}")]
    Channel(String),

    /// Error reply produced by the peer's responder
    #[error("{0}")]
    Remote(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Error::NotFound { kind, id: id.into() }
    }

    pub fn duplicate(kind: EntityKind, id: impl Into<String>) -> Self {
        Error::DuplicateId { kind, id: id.into() }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
