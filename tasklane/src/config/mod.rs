//! Configuration for the Tasklane client.
//!
//! Layered configuration with the following priority (highest first):
//! 1. TOML config file (`~/.config/tasklane/config.toml`)
//! 2. Compiled defaults
//!
//! A missing config file is not an error (defaults are used). An explicit
//! path that doesn't exist is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::mutate::RetryPolicy;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// Could not determine the user's config directory.
    #[error("could not determine config directory (no HOME or XDG_CONFIG_HOME)")]
    NoConfigDir,
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    api: ApiFileConfig,
    cache: CacheFileConfig,
    mutation: MutationFileConfig,
    list: ListFileConfig,
}

/// `[api]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ApiFileConfig {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

/// `[cache]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct CacheFileConfig {
    stale_secs: Option<u64>,
    persist_max_age_hours: Option<u64>,
}

/// `[mutation]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct MutationFileConfig {
    retries: Option<u32>,
    backoff_base_ms: Option<u64>,
    backoff_cap_ms: Option<u64>,
}

/// `[list]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ListFileConfig {
    page_size: Option<usize>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// API endpoint configuration (used by the HTTP transport).
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the task API, without a trailing `/tasks`.
    pub base_url: String,
    /// Fixed request timeout.
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api/v1".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Cache freshness configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Staleness window for fetched data.
    pub stale_after: Duration,
    /// Maximum trusted age for a persisted cache.
    pub persist_max_age: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(5 * 60),
            persist_max_age: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Mutation retry configuration.
#[derive(Debug, Clone)]
pub struct MutationConfig {
    /// Automatic retries after the initial attempt.
    pub retries: u32,
    /// Initial backoff delay.
    pub backoff_base: Duration,
    /// Backoff delay cap.
    pub backoff_cap: Duration,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            retries: 2,
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(5),
        }
    }
}

impl MutationConfig {
    /// The retry policy this configuration describes.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            backoff_base: self.backoff_base,
            backoff_cap: self.backoff_cap,
        }
    }
}

/// List presentation configuration.
#[derive(Debug, Clone)]
pub struct ListConfig {
    /// Page size for the paginated task list.
    pub page_size: usize,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self { page_size: 10 }
    }
}

/// Fully resolved client configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// API endpoint settings.
    pub api: ApiConfig,
    /// Cache freshness settings.
    pub cache: CacheConfig,
    /// Mutation retry settings.
    pub mutation: MutationConfig,
    /// List presentation settings.
    pub list: ListConfig,
}

impl ClientConfig {
    /// Loads configuration from the default location, falling back to
    /// compiled defaults when no file exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config directory cannot be
    /// determined or an existing file cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        let path = dir.join("tasklane").join("config.toml");
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Loads configuration from an explicit path. A missing file is an
    /// error here.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw)
    }

    fn parse(raw: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(raw)?;
        let defaults = Self::default();
        Ok(Self {
            api: ApiConfig {
                base_url: file.api.base_url.unwrap_or(defaults.api.base_url),
                timeout: file
                    .api
                    .timeout_secs
                    .map_or(defaults.api.timeout, Duration::from_secs),
            },
            cache: CacheConfig {
                stale_after: file
                    .cache
                    .stale_secs
                    .map_or(defaults.cache.stale_after, Duration::from_secs),
                persist_max_age: file
                    .cache
                    .persist_max_age_hours
                    .map_or(defaults.cache.persist_max_age, |h| {
                        Duration::from_secs(h * 60 * 60)
                    }),
            },
            mutation: MutationConfig {
                retries: file.mutation.retries.unwrap_or(defaults.mutation.retries),
                backoff_base: file
                    .mutation
                    .backoff_base_ms
                    .map_or(defaults.mutation.backoff_base, Duration::from_millis),
                backoff_cap: file
                    .mutation
                    .backoff_cap_ms
                    .map_or(defaults.mutation.backoff_cap, Duration::from_millis),
            },
            list: ListConfig {
                page_size: file.list.page_size.unwrap_or(defaults.list.page_size),
            },
        })
    }
}
