//! Runtime configuration for release tooling.
//!
//! All settings have sensible defaults (see [`crate::constants`]) so the tool
//! runs without any configuration file. A TOML file passed with `--config` can
//! override individual fields:
//!
//! ```toml
//! pypi_url = "https://pypi.example.org"
//! primary_git_host = "opendev.org/openstack"
//! http_timeout_secs = 10
//! max_attempts = 5
//! ```
//!
//! Unknown keys are rejected so typos surface immediately.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

use crate::constants::{
    DEFAULT_BATCH_PAUSE_MS, DEFAULT_BATCH_SIZE, DEFAULT_CONSTRAINTS_FILE, DEFAULT_GALAXY_URL,
    DEFAULT_GIT_TIMEOUT, DEFAULT_HTTP_TIMEOUT, DEFAULT_MAX_ATTEMPTS, DEFAULT_PRIMARY_GIT_HOST,
    DEFAULT_PYPI_URL, DEFAULT_RELEASE_NOTES_DIR, DEFAULT_REQUIREMENTS_RAW_URL,
};
use crate::core::ReleaseError;

/// Endpoints, timeouts and batching limits for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReleaseConfig {
    /// Base URL of the Python package index (JSON API)
    pub pypi_url: String,

    /// Base URL of Ansible Galaxy (v3 API)
    pub galaxy_url: String,

    /// Raw-file URL prefix of the requirements repository; `/{ref}/{file}` is appended
    pub requirements_raw_url: String,

    /// Upper-constraints file name inside the requirements repository
    pub constraints_file: String,

    /// Roles whose `src` contains this host are first-party; everything else is external
    pub primary_git_host: String,

    /// Directory (relative to `--root`) receiving copied release notes
    pub release_notes_dir: String,

    /// Per-request HTTP timeout in seconds
    pub http_timeout_secs: u64,

    /// Timeout for git network operations in seconds
    pub git_timeout_secs: u64,

    /// Attempts per lookup before giving up
    pub max_attempts: usize,

    /// Lookups issued before pausing
    pub batch_size: usize,

    /// Pause between batches in milliseconds
    pub batch_pause_ms: u64,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            pypi_url: DEFAULT_PYPI_URL.to_string(),
            galaxy_url: DEFAULT_GALAXY_URL.to_string(),
            requirements_raw_url: DEFAULT_REQUIREMENTS_RAW_URL.to_string(),
            constraints_file: DEFAULT_CONSTRAINTS_FILE.to_string(),
            primary_git_host: DEFAULT_PRIMARY_GIT_HOST.to_string(),
            release_notes_dir: DEFAULT_RELEASE_NOTES_DIR.to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT.as_secs(),
            git_timeout_secs: DEFAULT_GIT_TIMEOUT.as_secs(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_pause_ms: DEFAULT_BATCH_PAUSE_MS,
        }
    }
}

impl ReleaseConfig {
    /// Load the configuration from `path`, or return defaults when no path is given.
    pub async fn load_with_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path).await,
            None => Ok(Self::default()),
        }
    }

    /// Load and validate a TOML configuration file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .map_err(ReleaseError::from)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ReleaseError::ConfigError {
                message: "max_attempts must be at least 1".to_string(),
            }
            .into());
        }
        if self.batch_size == 0 {
            return Err(ReleaseError::ConfigError {
                message: "batch_size must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }

    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    #[must_use]
    pub const fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }

    #[must_use]
    pub const fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_defaults_without_path() {
        let config = ReleaseConfig::load_with_optional(None).await.unwrap();
        assert_eq!(config, ReleaseConfig::default());
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_partial_override() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("osa.toml");
        std::fs::write(&path, "pypi_url = \"http://localhost:8080\"\nmax_attempts = 5\n").unwrap();

        let config = ReleaseConfig::load_from(&path).await.unwrap();
        assert_eq!(config.pypi_url, "http://localhost:8080");
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.galaxy_url, DEFAULT_GALAXY_URL);
    }

    #[tokio::test]
    async fn test_unknown_key_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("osa.toml");
        std::fs::write(&path, "pypi_ulr = \"typo\"\n").unwrap();

        assert!(ReleaseConfig::load_from(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_zero_attempts_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("osa.toml");
        std::fs::write(&path, "max_attempts = 0\n").unwrap();

        let err = ReleaseConfig::load_from(&path).await.unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }
}
