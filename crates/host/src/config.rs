//! Host configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Store directory path
    pub store_path: PathBuf,

    /// Unix socket the editor connects to
    pub socket_path: PathBuf,

    /// Enables developer tools on secondary windows
    pub dev_mode: bool,

    /// File watcher configuration
    pub watcher: WatcherConfig,

    /// Test runtime configuration
    pub runtime: RuntimeConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            store_path: puppetry_common::default_store_path(),
            socket_path: puppetry_common::default_socket_path(),
            dev_mode: false,
            watcher: WatcherConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

/// File watcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Quiet period after the last change before notifying
    pub settle_window_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self { settle_window_ms: 300 }
    }
}

/// Test runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Default runtime-test directory
    pub runtime_test_dir: Option<PathBuf>,

    /// Interpreter for generated test files
    pub node_binary: String,

    /// Package manager used to install the runtime
    pub npm_binary: String,

    /// Per-file timeout
    pub test_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            runtime_test_dir: None,
            node_binary: "node".to_string(),
            npm_binary: "npm".to_string(),
            test_timeout_secs: 300,
        }
    }
}

impl HostConfig {
    /// Load configuration from file
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn settle_window(&self) -> Duration {
        Duration::from_millis(self.watcher.settle_window_ms)
    }

    /// Get the runtime-test directory
    pub fn runtime_test_dir(&self) -> PathBuf {
        self.runtime
            .runtime_test_dir
            .clone()
            .unwrap_or_else(|| self.store_path.join("runtime-test"))
    }

    pub fn node_config(&self) -> puppetry_runtime::NodeConfig {
        puppetry_runtime::NodeConfig {
            node_binary: self.runtime.node_binary.clone(),
            timeout: Duration::from_secs(self.runtime.test_timeout_secs),
            env: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: HostConfig = toml::from_str(
            r#"
            dev_mode = true

            [watcher]
            settle_window_ms = 50
            "#,
        )
        .unwrap();
        assert!(config.dev_mode);
        assert_eq!(config.settle_window(), Duration::from_millis(50));
        assert_eq!(config.runtime.node_binary, "node");
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf/host.toml");
        let mut config = HostConfig::default();
        config.runtime.test_timeout_secs = 42;
        config.save(&path).unwrap();

        let loaded = HostConfig::load(&path).unwrap();
        assert_eq!(loaded.runtime.test_timeout_secs, 42);
        assert_eq!(loaded.node_config().timeout, Duration::from_secs(42));
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = HostConfig::load(std::path::Path::new("/no/such/host.toml")).unwrap();
        assert_eq!(config.watcher.settle_window_ms, 300);
    }
}
