//! Editor settings
//!
//! Persisted as JSON in the user data directory and merged over the
//! defaults on load, so a file written by an older version still loads.

use puppetry_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Set to any non-empty value to start without saved settings
pub const CLEAN_START_ENV: &str = "PUPPETRY_CLEAN_START";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Project opened on startup
    pub project_directory: Option<PathBuf>,

    /// Where the automation runtime is installed
    pub runtime_test_directory: Option<PathBuf>,
}

impl Settings {
    pub fn runtime_test_directory(&self) -> PathBuf {
        self.runtime_test_directory
            .clone()
            .unwrap_or_else(puppetry_common::default_runtime_test_path)
    }
}

/// Settings file location and load policy
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    clean_start: bool,
}

fn clean_start_from_env() -> bool {
    std::env::var(CLEAN_START_ENV)
        .map(|v| !v.is_empty() && v != "0")
        .unwrap_or(false)
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            clean_start: clean_start_from_env(),
        }
    }

    pub fn with_clean_start(mut self, clean_start: bool) -> Self {
        self.clean_start = clean_start;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved settings laid over `current`. Saved values win key by key.
    pub async fn load(&self, current: &Settings) -> Result<Settings> {
        if self.clean_start {
            info!("Clean start, ignoring saved settings");
            return Ok(current.clone());
        }
        let saved = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings at {}", self.path.display());
                return Ok(current.clone());
            }
            Err(e) => return Err(e.into()),
        };

        let saved: serde_json::Value = match serde_json::from_slice(&saved) {
            Ok(value) => value,
            Err(e) => {
                warn!("Ignoring unreadable settings {}: {}", self.path.display(), e);
                return Ok(current.clone());
            }
        };
        let serde_json::Value::Object(saved) = saved else {
            warn!("Ignoring settings {}: not an object", self.path.display());
            return Ok(current.clone());
        };

        let mut merged = serde_json::to_value(current)?;
        if let serde_json::Value::Object(fields) = &mut merged {
            fields.extend(saved);
        }
        Ok(serde_json::from_value(merged)?)
    }

    pub async fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_vec_pretty(settings)?;
        tokio::fs::write(&self.path, data)
            .await
            .map_err(|e| {
                let context = format!("{}: {}", self.path.display(), e);
                Error::Io(std::io::Error::new(e.kind(), context))
            })
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(puppetry_common::default_settings_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_saved_values_override_current() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).with_clean_start(false);
        let saved = r#"{"projectDirectory": "/projects/shop", "unknown": 1}"#;
        std::fs::write(store.path(), saved).unwrap();

        let current = Settings {
            runtime_test_directory: Some("/rt".into()),
            ..Default::default()
        };
        let loaded = store.load(&current).await.unwrap();
        assert_eq!(loaded.project_directory, Some(PathBuf::from("/projects/shop")));
        assert_eq!(loaded.runtime_test_directory, Some(PathBuf::from("/rt")));
    }

    #[tokio::test]
    async fn test_clean_start_ignores_saved() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).with_clean_start(false);
        store
            .save(&Settings { project_directory: Some("/old".into()), ..Default::default() })
            .await
            .unwrap();

        let clean = store.clone().with_clean_start(true);
        assert_eq!(clean.load(&Settings::default()).await.unwrap(), Settings::default());
        let kept = store.load(&Settings::default()).await.unwrap();
        assert_eq!(kept.project_directory, Some(PathBuf::from("/old")));
    }

    #[tokio::test]
    async fn test_missing_or_broken_file_keeps_current() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).with_clean_start(false);
        assert_eq!(store.load(&Settings::default()).await.unwrap(), Settings::default());
        std::fs::write(store.path(), "not json").unwrap();
        assert_eq!(store.load(&Settings::default()).await.unwrap(), Settings::default());
    }
}
