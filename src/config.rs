//! Configuration Management
//!
//! Handles persistent configuration storage for dtrackctl.

use crate::sync::DEFAULT_PAGE_SIZE;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the server URL
pub const HOST_ENV: &str = "DEPENDENCYTRACK_HOST";

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "DEPENDENCYTRACK_API_KEY";

const DEFAULT_HOST: &str = "http://localhost:8081";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Last used Dependency-Track host
    #[serde(default)]
    pub host: Option<String>,
    /// Items requested per page when draining listings
    #[serde(default)]
    pub page_size: Option<usize>,
    /// Per-request timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("dtrackctl").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load configuration from a specific file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get effective host (CLI > environment > config > default)
    pub fn effective_host(&self, cli: Option<&str>) -> String {
        cli.map(str::to_string)
            .or_else(|| std::env::var(HOST_ENV).ok().filter(|h| !h.is_empty()))
            .or_else(|| self.host.clone())
            .unwrap_or_else(|| DEFAULT_HOST.to_string())
    }

    /// API key from the environment; never persisted
    pub fn api_key() -> Option<String> {
        std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty())
    }

    pub fn effective_page_size(&self) -> usize {
        self.page_size.filter(|s| *s > 0).unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn effective_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.filter(|s| *s > 0).unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("dtrackctl-test-{}", uuid::Uuid::new_v4()))
            .join("config.json")
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = Config::load_from(&temp_path());
        assert_eq!(config, Config::default());
        assert_eq!(config.effective_page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(config.effective_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let path = temp_path();
        let config = Config {
            host: Some("https://dtrack.example.com".to_string()),
            page_size: Some(25),
            timeout_secs: Some(5),
        };

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path);

        assert_eq!(loaded, config);
        assert_eq!(loaded.effective_page_size(), 25);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        assert_eq!(Config::load_from(&path), Config::default());
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_cli_host_wins() {
        let config = Config {
            host: Some("https://from-config".to_string()),
            ..Config::default()
        };
        assert_eq!(config.effective_host(Some("https://from-cli")), "https://from-cli");
    }

    #[test]
    fn test_zero_page_size_falls_back() {
        let config = Config {
            page_size: Some(0),
            ..Config::default()
        };
        assert_eq!(config.effective_page_size(), DEFAULT_PAGE_SIZE);
    }
}
