//! Configuration management for mintview
//!
//! This module handles loading, parsing, and managing configuration from various sources:
//! - Configuration files (TOML format)
//! - Environment variables
//! - Command-line arguments
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "MINTVIEW_";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Interactive paging configuration
    #[serde(default)]
    pub query: QueryConfig,

    /// Column value catalog configuration
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Bulk export configuration
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Paging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Rows per page when the caller does not ask for a size
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Optional upper bound for a single page; unset means a page is only
    /// bounded by the number of matching rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_page_size: Option<usize>,

    /// Page fetch timeout in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

/// Column value catalog configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Maximum number of distinct values returned for one column
    #[serde(default = "default_value_cap")]
    pub value_cap: usize,

    /// Catalog lookup timeout in seconds
    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_secs: u64,
}

/// Export configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Rows pulled from the planner per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Encoded chunks buffered between the encoder and the consumer
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Directory exports are written to when no output path is given
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Show a progress bar on the terminal
    #[serde(default = "default_show_progress")]
    pub show_progress: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_page_size() -> usize {
    1000
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_value_cap() -> usize {
    10_000
}

fn default_lookup_timeout() -> u64 {
    10
}

fn default_batch_size() -> usize {
    1000
}

fn default_channel_capacity() -> usize {
    8
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_show_progress() -> bool {
    true
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: None,
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            value_cap: default_value_cap(),
            lookup_timeout_secs: default_lookup_timeout(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            channel_capacity: default_channel_capacity(),
            output_dir: default_output_dir(),
            show_progress: default_show_progress(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Load configuration from multiple sources with proper precedence
    ///
    /// A missing file at the default location is not an error; an explicitly
    /// named file that does not exist is.
    ///
    /// # Arguments
    /// * `path` - Explicit configuration file, if any
    ///
    /// # Returns
    /// * `Result<Config>` - Merged configuration or error
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = Self::default_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `MINTVIEW_*` overrides
    ///
    /// Example: `MINTVIEW_EXPORT_BATCH_SIZE=5000`
    ///
    /// # Arguments
    /// * `vars` - Environment variable pairs (usually `std::env::vars()`)
    pub fn apply_env<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "QUERY_DEFAULT_PAGE_SIZE" => {
                    self.query.default_page_size = parse_env(&key, &value)?
                }
                "QUERY_MAX_PAGE_SIZE" => {
                    self.query.max_page_size = Some(parse_env(&key, &value)?)
                }
                "QUERY_FETCH_TIMEOUT_SECS" => {
                    self.query.fetch_timeout_secs = parse_env(&key, &value)?
                }
                "CATALOG_VALUE_CAP" => self.catalog.value_cap = parse_env(&key, &value)?,
                "CATALOG_LOOKUP_TIMEOUT_SECS" => {
                    self.catalog.lookup_timeout_secs = parse_env(&key, &value)?
                }
                "EXPORT_BATCH_SIZE" => self.export.batch_size = parse_env(&key, &value)?,
                "EXPORT_CHANNEL_CAPACITY" => {
                    self.export.channel_capacity = parse_env(&key, &value)?
                }
                "EXPORT_OUTPUT_DIR" => self.export.output_dir = PathBuf::from(value),
                "LOG_LEVEL" => self.logging.level = LogLevel::parse(&value)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - Path to default configuration file
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mintview")
            .join("config.toml")
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("query.default_page_size", self.query.default_page_size as u64),
            (
                "query.max_page_size",
                self.query.max_page_size.map_or(1, |max| max as u64),
            ),
            ("query.fetch_timeout_secs", self.query.fetch_timeout_secs),
            ("catalog.value_cap", self.catalog.value_cap as u64),
            ("catalog.lookup_timeout_secs", self.catalog.lookup_timeout_secs),
            ("export.batch_size", self.export.batch_size as u64),
            ("export.channel_capacity", self.export.channel_capacity as u64),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: "0".to_string(),
                }
                .into());
            }
        }

        if self
            .query
            .max_page_size
            .is_some_and(|max| self.query.default_page_size > max)
        {
            return Err(ConfigError::InvalidValue {
                field: "query.default_page_size".to_string(),
                value: self.query.default_page_size.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Get page fetch timeout as Duration
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.query.fetch_timeout_secs)
    }

    /// Get catalog lookup timeout as Duration
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog.lookup_timeout_secs)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        ConfigError::InvalidValue {
            field: key.to_string(),
            value: value.to_string(),
        }
        .into()
    })
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }

    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                value: other.to_string(),
            }
            .into()),
        }
    }
}
