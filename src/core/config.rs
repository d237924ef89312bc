//! Configuration management for the aggregation engine.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - Validation and defaults
//! - Programmatic construction via a builder

use crate::core::{Result, TallyError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete configuration for the aggregation engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Aggregation configuration
    pub aggregation: AggregationConfig,
    /// Watchdog configuration
    pub watchdog: WatchdogConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Width of one time slice; writes within the same slice for the same
    /// entity are merged into a single stored record
    #[serde(with = "humantime_serde")]
    pub granularity: Duration,
}

/// Watchdog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Interval between supervision ticks
    #[serde(with = "humantime_serde")]
    pub check_interval: Duration,
    /// Backoff applied after the first recorded store failure
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    /// Upper bound on the failure backoff
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Structured logging format
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            aggregation: AggregationConfig::default(),
            watchdog: WatchdogConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        AggregationConfig {
            granularity: Duration::from_millis(120_000), // 2 minute slices
        }
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        WatchdogConfig {
            check_interval: Duration::from_secs(1),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        ConfigBuilder::new().from_yaml(&contents)?.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.aggregation.granularity.is_zero() {
            return Err(TallyError::config("aggregation granularity must be greater than 0"));
        }

        if self.watchdog.check_interval.is_zero() {
            return Err(TallyError::config("watchdog check_interval must be greater than 0"));
        }

        if self.watchdog.initial_backoff > self.watchdog.max_backoff {
            return Err(TallyError::config(format!(
                "initial_backoff ({:?}) cannot exceed max_backoff ({:?})",
                self.watchdog.initial_backoff, self.watchdog.max_backoff
            )));
        }

        Ok(())
    }

    /// Slice width in epoch milliseconds
    pub fn granularity_millis(&self) -> i64 {
        self.aggregation.granularity.as_millis() as i64
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Install a global tracing subscriber per the logging configuration.
///
/// Fails if a subscriber is already installed; callers embedding the engine
/// in a larger process should install their own instead.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_new(config.level.as_str())
        .map_err(|e| TallyError::config(format!("invalid log level: {}", e)))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if config.structured {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| TallyError::config(format!("failed to install subscriber: {}", e)))
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| TallyError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Set slice granularity
    pub fn granularity(mut self, granularity: Duration) -> Self {
        self.config.aggregation.granularity = granularity;
        self
    }

    /// Set watchdog check interval
    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.config.watchdog.check_interval = interval;
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
