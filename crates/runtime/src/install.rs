//! Runtime-test directory
//!
//! The directory holds the Node packages generated suites need. It is ready
//! once `package.json` is written and `npm install` populated `node_modules`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use puppetry_common::persistence::runtime_test_path_ready;
use serde_json::json;
use tokio::fs;
use tokio::process::Command as TokioCommand;
use tracing::{debug, info, warn};

use crate::error::{RuntimeError, RuntimeResult};

#[derive(Debug, Clone)]
pub struct RuntimeTestDir {
    path: PathBuf,
}

impl RuntimeTestDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_ready(&self) -> bool {
        runtime_test_path_ready(&self.path)
    }

    /// `package.json` written before installing
    pub fn manifest() -> serde_json::Value {
        json!({
            "name": "puppetry-runtime-test",
            "private": true,
            "version": puppetry_common::VERSION,
            "description": "Runtime for tests generated by Puppetry",
            "scripts": {
                "test": "jest"
            },
            "dependencies": {
                "puppeteer": "^21.0.0",
                "jest": "^29.7.0"
            }
        })
    }

    /// Create the directory, write the manifest and run `npm install`
    pub async fn install(&self, npm_binary: &str) -> RuntimeResult<()> {
        info!("Installing runtime test environment in {}", self.path.display());
        fs::create_dir_all(&self.path).await?;
        let manifest = serde_json::to_vec_pretty(&Self::manifest())?;
        fs::write(self.path.join("package.json"), manifest).await?;

        let output = TokioCommand::new(npm_binary)
            .args(["install", "--no-audit", "--no-fund"])
            .current_dir(&self.path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => RuntimeError::NodeNotFound(npm_binary.to_string()),
                _ => RuntimeError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RuntimeError::Install(format!(
                "`{} install` exited with {}: {}",
                npm_binary,
                output.status,
                stderr.trim()
            )));
        }
        if !self.is_ready() {
            return Err(RuntimeError::Install(format!(
                "{} has no node_modules after install",
                self.path.display()
            )));
        }

        info!("Runtime test environment ready");
        Ok(())
    }

    /// Delete a half-installed directory
    pub async fn remove(&self) -> RuntimeResult<()> {
        match fs::remove_dir_all(&self.path).await {
            Ok(()) => {
                debug!("Removed {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!("Failed to remove {}: {}", self.path.display(), e);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_manifest_declares_automation_dependencies() {
        let manifest = RuntimeTestDir::manifest();
        assert!(manifest["dependencies"]["puppeteer"].is_string());
        assert_eq!(manifest["private"], true);
    }

    #[tokio::test]
    async fn test_install_without_npm_is_reported() {
        let dir = TempDir::new().unwrap();
        let runtime = RuntimeTestDir::new(dir.path().join("rt"));
        let err = runtime.install("puppetry-missing-npm").await.unwrap_err();
        assert!(
            matches!(err, RuntimeError::NodeNotFound(ref bin) if bin == "puppetry-missing-npm")
        );
        assert!(runtime.path().join("package.json").is_file());
        assert!(!runtime.is_ready());
    }

    #[tokio::test]
    async fn test_failed_install_is_reported() {
        let dir = TempDir::new().unwrap();
        let runtime = RuntimeTestDir::new(dir.path().join("rt"));
        // `false install ...` exits non-zero without touching the directory
        let err = runtime.install("false").await.unwrap_err();
        assert!(matches!(err, RuntimeError::Install(_)));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let runtime = RuntimeTestDir::new(dir.path().join("rt"));
        runtime.remove().await.unwrap();
        std::fs::create_dir_all(runtime.path().join("node_modules")).unwrap();
        runtime.remove().await.unwrap();
        assert!(!runtime.path().exists());
    }
}
