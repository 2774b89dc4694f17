//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://backvincy.onrender.com".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ApiConfig {
    /// Base URL without a trailing slash
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Polling intervals for the live-session and device pollers
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollingConfig {
    #[serde(default = "default_live_refresh")]
    pub live_session_refresh_secs: u64,

    #[serde(default = "default_live_debounce")]
    pub live_session_debounce_ms: u64,

    #[serde(default = "default_countdown_tick")]
    pub countdown_tick_ms: u64,

    #[serde(default = "default_device_refresh")]
    pub device_refresh_secs: u64,
}

fn default_live_refresh() -> u64 {
    30
}

fn default_live_debounce() -> u64 {
    5000
}

fn default_countdown_tick() -> u64 {
    1000
}

fn default_device_refresh() -> u64 {
    3
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            live_session_refresh_secs: default_live_refresh(),
            live_session_debounce_ms: default_live_debounce(),
            countdown_tick_ms: default_countdown_tick(),
            device_refresh_secs: default_device_refresh(),
        }
    }
}

impl PollingConfig {
    pub fn live_session_refresh(&self) -> Duration {
        Duration::from_secs(self.live_session_refresh_secs)
    }

    pub fn live_session_debounce(&self) -> Duration {
        Duration::from_millis(self.live_session_debounce_ms)
    }

    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms)
    }

    pub fn device_refresh(&self) -> Duration {
        Duration::from_secs(self.device_refresh_secs)
    }

    /// Every ticking interval must be non-zero; the debounce may be zero
    pub fn validate(&self) -> Result<(), String> {
        let intervals = [
            ("live_session_refresh_secs", self.live_session_refresh_secs),
            ("countdown_tick_ms", self.countdown_tick_ms),
            ("device_refresh_secs", self.device_refresh_secs),
        ];

        let zero: Vec<&str> = intervals
            .iter()
            .filter(|(_, value)| *value == 0)
            .map(|(name, _)| *name)
            .collect();

        if zero.is_empty() {
            Ok(())
        } else {
            Err(format!("polling interval must be non-zero: {}", zero.join(", ")))
        }
    }
}

/// Credential storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_credentials_path")]
    pub credentials_path: String,
}

fn default_credentials_path() -> String {
    dirs::data_local_dir()
        .map(|p| {
            p.join("vincy")
                .join("credentials.json")
                .to_string_lossy()
                .to_string()
        })
        .unwrap_or_else(|| "./vincy_credentials.json".to_string())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config = Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })?;

        config
            .polling
            .validate()
            .map_err(|error| ConfigError::Invalid {
                path: path.to_path_buf(),
                error,
            })?;

        Ok(config)
    }

    fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    ///
    /// Logs where the config came from, so call this after the subscriber
    /// is installed. Use [`Config::discover`] to log later.
    pub fn load_default() -> Self {
        let loaded = Self::discover();
        loaded.log();
        loaded.config
    }

    /// Search the default locations without logging anything
    pub fn discover() -> LoadedConfig {
        Self::discover_in(&Self::default_paths())
    }

    fn discover_in(paths: &[PathBuf]) -> LoadedConfig {
        let mut skipped = Vec::new();

        for path in paths {
            if !path.exists() {
                continue;
            }
            match Self::load_with_env(path) {
                Ok(config) => {
                    return LoadedConfig {
                        config,
                        source: Some(path.clone()),
                        skipped,
                    }
                }
                Err(e) => skipped.push(e),
            }
        }

        LoadedConfig {
            config: Self::from_env(),
            source: None,
            skipped,
        }
    }

    /// Config file locations, in lookup order
    pub fn default_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("vincy").join("config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("VINCY_API_URL") {
            self.api.base_url = url;
        }
        if let Ok(path) = std::env::var("VINCY_CREDENTIALS_PATH") {
            self.storage.credentials_path = path;
        }
        if let Ok(level) = std::env::var("VINCY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("VINCY_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            polling: PollingConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Result of searching the default config locations
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    /// File the config was read from; `None` means defaults plus env
    pub source: Option<PathBuf>,
    /// Files that exist but could not be used
    pub skipped: Vec<ConfigError>,
}

impl LoadedConfig {
    pub fn log(&self) {
        for error in &self.skipped {
            tracing::warn!("{}", error);
        }
        match &self.source {
            Some(path) => tracing::info!("Loaded config from {:?}", path),
            None => tracing::debug!("Using default config with environment overrides"),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid config file {path:?}: {error}")]
    Invalid { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Vincy Client Configuration
#
# Environment variables override these settings:
# - VINCY_API_URL
# - VINCY_CREDENTIALS_PATH
# - VINCY_LOG_LEVEL
# - VINCY_LOG_FORMAT

[api]
# Backend base URL
base_url = "https://backvincy.onrender.com"

# Request timeout in seconds
request_timeout_secs = 30

[polling]
# Full refresh of the live-session list (seconds)
live_session_refresh_secs = 30

# Refresh triggers closer together than this are dropped (ms)
live_session_debounce_ms = 5000

# Local countdown recomputation (ms); intervals must be non-zero
countdown_tick_ms = 1000

# Latest device state refresh (seconds)
device_refresh_secs = 3

[storage]
# Where the bearer token is kept between runs
# credentials_path = "~/.local/share/vincy/credentials.json"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
