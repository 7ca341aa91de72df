//! Configuration management
//!
//! This module handles loading and saving the r2up configuration file.
//! The configuration file is stored in TOML format at
//! `~/.config/r2up/config.toml`, or under `$R2UP_CONFIG_DIR` when set.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::multipart::DEFAULT_PART_SIZE;
use crate::progress::PROGRESS_THRESHOLD;

/// Current configuration schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "R2UP_CONFIG_DIR";

/// Default public storage domain for object URLs
pub const DEFAULT_STORAGE_DOMAIN: &str = "r2.cloudflarestorage.com";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// CLI output defaults
    #[serde(default)]
    pub defaults: Defaults,

    /// Remote store connection
    #[serde(default)]
    pub store: StoreConfig,

    /// Transfer tuning
    #[serde(default)]
    pub transfer: TransferConfig,

    /// SDK retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// SDK timeouts
    #[serde(default)]
    pub timeout: TimeoutConfig,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            defaults: Defaults::default(),
            store: StoreConfig::default(),
            transfer: TransferConfig::default(),
            retry: RetryConfig::default(),
            timeout: TimeoutConfig::default(),
        }
    }
}

/// Default settings for CLI behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    /// Output format: "human" or "json"
    #[serde(default = "default_output")]
    pub output: String,

    /// Color mode: "auto", "always", or "never"
    #[serde(default = "default_color")]
    pub color: String,

    /// Show progress bars
    #[serde(default = "default_true")]
    pub progress: bool,
}

fn default_output() -> String {
    "human".to_string()
}

fn default_color() -> String {
    "auto".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            progress: true,
        }
    }
}

/// Connection details for the remote store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Account identifier, part of the endpoint and of public URLs
    #[serde(default)]
    pub account_id: String,

    /// Access key ID
    #[serde(default)]
    pub access_key: String,

    /// Secret access key
    #[serde(default)]
    pub secret_key: String,

    /// Target bucket
    #[serde(default)]
    pub bucket: String,

    /// Signing region
    #[serde(default = "default_region")]
    pub region: String,

    /// Explicit endpoint URL; derived from the account id when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Domain used when building public object URLs
    #[serde(default = "default_storage_domain")]
    pub storage_domain: String,
}

fn default_region() -> String {
    "auto".to_string()
}

fn default_storage_domain() -> String {
    DEFAULT_STORAGE_DOMAIN.to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            account_id: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            bucket: String::new(),
            region: default_region(),
            endpoint: None,
            storage_domain: default_storage_domain(),
        }
    }
}

impl StoreConfig {
    /// Create a store configuration with the required fields
    pub fn new(
        account_id: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            bucket: bucket.into(),
            ..Default::default()
        }
    }

    /// Effective endpoint URL
    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://{}.{}", self.account_id, self.storage_domain),
        }
    }

    /// Check that every required field is present and the endpoint parses
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("account_id", &self.account_id),
            ("access_key", &self.access_key),
            ("secret_key", &self.secret_key),
            ("bucket", &self.bucket),
        ]
        .iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| *k)
        .collect();

        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "Missing store settings: {}",
                missing.join(", ")
            )));
        }

        let endpoint = url::Url::parse(&self.endpoint_url())?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "Endpoint must be http or https, got '{}'",
                endpoint.scheme()
            )));
        }
        Ok(())
    }
}

/// Transfer tuning shared by every upload of one uploader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Default multipart part size in bytes
    #[serde(default = "default_part_size")]
    pub part_size: u64,

    /// Maximum number of parts in flight per multipart upload
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Single-shot uploads above this size report byte progress
    #[serde(default = "default_progress_threshold")]
    pub progress_threshold: u64,
}

fn default_part_size() -> u64 {
    DEFAULT_PART_SIZE
}

fn default_concurrency() -> usize {
    1
}

fn default_progress_threshold() -> u64 {
    PROGRESS_THRESHOLD
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            part_size: default_part_size(),
            concurrency: default_concurrency(),
            progress_threshold: default_progress_threshold(),
        }
    }
}

/// Retry configuration for store requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per request, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff duration in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    100
}

fn default_max_backoff() -> u64 {
    10000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

/// Timeout configuration for store requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,

    /// Per-request timeout in milliseconds, covering all retry attempts
    #[serde(default = "default_operation_timeout")]
    pub operation_ms: u64,
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_operation_timeout() -> u64 {
    300_000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_timeout(),
            operation_ms: default_operation_timeout(),
        }
    }
}

/// Configuration manager handles loading and saving config
#[derive(Debug)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the default config path
    pub fn new() -> Result<Self> {
        let config_dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .ok_or_else(|| Error::Config("Could not determine config directory".into()))?
                .join("r2up"),
        };
        Ok(Self {
            config_path: config_dir.join("config.toml"),
        })
    }

    /// Create a ConfigManager with a custom path (useful for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the configuration file path
    pub fn config_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Load configuration from disk
    ///
    /// If the configuration file doesn't exist, returns a default configuration.
    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        if config.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Configuration file version {} is newer than supported version {}. Please upgrade r2up.",
                config.schema_version, SCHEMA_VERSION
            )));
        }
        config.schema_version = SCHEMA_VERSION;

        Ok(config)
    }

    /// Save configuration to disk
    ///
    /// Creates parent directories if they don't exist.
    /// Sets file permissions to 600 (owner read/write only).
    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        std::fs::write(&self.config_path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.config_path, permissions)?;
        }

        Ok(())
    }
}
