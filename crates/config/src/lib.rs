#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for relcheck
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/relcheck/config.toml)
//! - Environment variables (RELCHECK_*)
//! - CLI flags (applied by the binary, highest precedence)

use relcheck_errors::{ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const DEFAULT_UPSTREAM_URL: &str = "https://download.example-distro.org";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,

    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub network: NetworkConfig,
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    /// Root of the local content cache populated by the fetch step
    #[serde(default = "default_cache_path")]
    pub cache: PathBuf,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout")]
    pub timeout: u64, // seconds
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64, // seconds
}

fn default_upstream_url() -> String {
    DEFAULT_UPSTREAM_URL.to_string()
}

fn default_cache_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/var/cache"))
        .join("relcheck")
}

fn default_timeout() -> u64 {
    300
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream_url: default_upstream_url(),
            paths: PathConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            cache: default_cache_path(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            retries: default_retries(),
            retry_delay: default_retry_delay(),
        }
    }
}

impl Config {
    /// Load configuration with the standard precedence: the explicit
    /// path if given, then the user config file, then compiled defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read or
    /// parsed. A missing file is not an error.
    pub async fn load_or_default(explicit: Option<&Path>) -> Result<Self, Error> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(path) = explicit {
            candidates.push(path.to_path_buf());
        }
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("relcheck/config.toml"));
        }

        for path in candidates {
            match fs::read_to_string(&path).await {
                Ok(content) => {
                    debug!(path = %path.display(), "loading config file");
                    return toml::from_str(&content).map_err(|e| {
                        ConfigError::ParseFailed {
                            path: path.display().to_string(),
                            message: e.to_string(),
                        }
                        .into()
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(ConfigError::ReadFailed {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    }
                    .into())
                }
            }
        }

        Ok(Self::default())
    }

    /// Merge `RELCHECK_*` environment variables into the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable holds an unparseable value.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Ok(url) = std::env::var("RELCHECK_UPSTREAM_URL") {
            self.upstream_url = url;
        }
        if let Ok(cache) = std::env::var("RELCHECK_CACHE") {
            self.paths.cache = PathBuf::from(cache);
        }
        if let Ok(retries) = std::env::var("RELCHECK_RETRIES") {
            self.network.retries =
                retries
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: "RELCHECK_RETRIES".to_string(),
                        message: format!("not a number: {retries:?}"),
                    })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let config = Config::load_or_default(None).await.unwrap();
        assert_eq!(config.upstream_url, DEFAULT_UPSTREAM_URL);
        assert_eq!(config.network.retries, 3);
    }

    #[tokio::test]
    async fn explicit_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "upstream_url = \"http://mirror.internal\"\n\n[paths]\ncache = \"/srv/cache\"\n",
        )
        .unwrap();

        let config = Config::load_or_default(Some(&path)).await.unwrap();
        assert_eq!(config.upstream_url, "http://mirror.internal");
        assert_eq!(config.paths.cache, PathBuf::from("/srv/cache"));
        // unspecified sections fall back to defaults
        assert_eq!(config.network.timeout, 300);
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "upstream_url = [not toml").unwrap();

        assert!(Config::load_or_default(Some(&path)).await.is_err());
    }
}
