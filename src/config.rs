/// Service configuration loader - parses hydrosync.toml
///
/// Holds the monitored stations, parameter codes, historical start date and
/// remote service settings. Every section is optional; missing values fall
/// back to the default Water Office station and parameter set.

use chrono::NaiveDateTime;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::model::{DEFAULT_PARAMETERS, DEFAULT_STATIONS, TIMESTAMP_FORMAT};

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "hydrosync.toml";

const DEFAULT_BASE_URL: &str = "https://wateroffice.ec.gc.ca/services/real_time_data/csv/inline";
const DEFAULT_START: &str = "2020-08-24 00:00:00";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Everything the sync engine needs. Immutable once loaded; the orchestrator
/// receives its own copy at construction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// CSV endpoint of the real-time data service.
    pub base_url: String,
    /// Station identifiers requested on every fetch, e.g. `["05OJ005"]`.
    pub stations: Vec<String>,
    /// Parameter codes requested on every fetch, e.g. `["46", "47"]`.
    pub parameters: Vec<String>,
    /// Checkpoint used when the store is empty (`YYYY-MM-DD HH:MM:SS`).
    pub default_start: String,
    /// Upper bound on a single remote request, in seconds.
    pub timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            stations: DEFAULT_STATIONS.iter().map(|s| s.to_string()).collect(),
            parameters: DEFAULT_PARAMETERS.iter().map(|p| p.to_string()).collect(),
            default_start: DEFAULT_START.to_string(),
            timeout_secs: 60,
        }
    }
}

impl SyncConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("sync.base_url must not be empty".into()));
        }
        if self.stations.is_empty() {
            return Err(ConfigError::Invalid("sync.stations must list at least one station".into()));
        }
        if self.parameters.is_empty() {
            return Err(ConfigError::Invalid("sync.parameters must list at least one parameter".into()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("sync.timeout_secs must be greater than zero".into()));
        }
        NaiveDateTime::parse_from_str(&self.default_start, TIMESTAMP_FORMAT).map_err(|e| {
            ConfigError::Invalid(format!(
                "sync.default_start '{}' is not YYYY-MM-DD HH:MM:SS: {}",
                self.default_start, e
            ))
        })?;
        Ok(())
    }
}

/// HTTP endpoint settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Number of threads answering requests.
    pub worker_threads: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            worker_threads: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level: "debug", "info", "warn" or "error".
    pub level: String,
    /// Optional file that receives a copy of every log line.
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Root configuration structure for TOML parsing
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub sync: SyncConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parses and validates configuration text.
pub fn parse_config(contents: &str, origin: &str) -> Result<ServiceConfig, ConfigError> {
    let config: ServiceConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
        path: origin.to_string(),
        source,
    })?;

    config.sync.validate()?;
    if config.server.worker_threads == 0 {
        return Err(ConfigError::Invalid("server.worker_threads must be greater than zero".into()));
    }

    Ok(config)
}

/// Loads the configuration file at `path`.
pub fn load_config(path: impl AsRef<Path>) -> Result<ServiceConfig, ConfigError> {
    let path = path.as_ref();
    let origin = path.display().to_string();

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: origin.clone(),
        source,
    })?;

    parse_config(&contents, &origin)
}

/// Loads `path` if it exists, otherwise returns the built-in defaults.
pub fn load_config_or_default(path: impl AsRef<Path>) -> Result<ServiceConfig, ConfigError> {
    let path = path.as_ref();
    if path.exists() {
        load_config(path)
    } else {
        Ok(ServiceConfig::default())
    }
}
