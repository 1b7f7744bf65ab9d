//! Error types for the automation runtime

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("`{0}` not found. Install Node.js and make sure it is on PATH")]
    NodeNotFound(String),

    #[error("Runtime install failed: {0}")]
    Install(String),

    #[error("Timeout running {file} after {secs} s")]
    Timeout { file: String, secs: u64 },

    #[error("Cannot prepare test run: {0}")]
    Preparation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
