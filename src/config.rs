//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{RcioError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub spi: SpiConfig,
    #[serde(default)]
    pub rc_input: RcInputConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// SPI link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SpiConfig {
    /// spidev node; empty means try the default nodes
    #[serde(default = "default_spi_device")]
    pub device: String,

    /// Pause before each bus phase, in microseconds
    #[serde(default = "default_settle_us")]
    pub settle_us: u64,
}

/// RC input tracker configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RcInputConfig {
    #[serde(default = "default_rc_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_rc_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

/// Status tracker configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StatusConfig {
    #[serde(default = "default_status_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_status_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

/// Snapshot recorder configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_telemetry_path")]
    pub path: String,

    #[serde(default = "default_telemetry_interval_ms")]
    pub interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log directory; empty logs to stdout
    #[serde(default)]
    pub dir: String,
}

// Default value functions
fn default_spi_device() -> String { "/dev/spidev0.1".to_string() }
fn default_settle_us() -> u64 { 150 }

fn default_rc_interval_ms() -> u64 { 10 }
fn default_rc_initial_delay_ms() -> u64 { 10 }

fn default_status_interval_ms() -> u64 { 200 }
fn default_status_initial_delay_ms() -> u64 { 20 }

fn default_telemetry_path() -> String { "./logs/rcio.jsonl".to_string() }
fn default_telemetry_interval_ms() -> u64 { 1000 }

fn default_log_level() -> String { "info".to_string() }

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            device: default_spi_device(),
            settle_us: default_settle_us(),
        }
    }
}

impl Default for RcInputConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_rc_interval_ms(),
            initial_delay_ms: default_rc_initial_delay_ms(),
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_status_interval_ms(),
            initial_delay_ms: default_status_initial_delay_ms(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_telemetry_path(),
            interval_ms: default_telemetry_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: String::new(),
        }
    }
}

impl SpiConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_micros(self.settle_us)
    }
}

impl RcInputConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

impl StatusConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

impl TelemetryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rcio_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load `path` if it exists, otherwise fall back to built-in defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate configuration text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.spi.settle_us > 10_000 {
            return Err(invalid("settle_us must be at most 10000"));
        }

        if self.rc_input.interval_ms == 0 || self.rc_input.interval_ms > 1000 {
            return Err(invalid("rc_input.interval_ms must be between 1 and 1000"));
        }

        if self.status.interval_ms == 0 || self.status.interval_ms > 60000 {
            return Err(invalid("status.interval_ms must be between 1 and 60000"));
        }

        for (name, value) in [
            ("rc_input.initial_delay_ms", self.rc_input.initial_delay_ms),
            ("status.initial_delay_ms", self.status.initial_delay_ms),
        ] {
            if value > 60000 {
                return Err(invalid(&format!("{} must be at most 60000", name)));
            }
        }

        if self.telemetry.enabled && self.telemetry.path.is_empty() {
            return Err(invalid("telemetry path cannot be empty when enabled"));
        }

        if self.telemetry.interval_ms == 0 || self.telemetry.interval_ms > 60000 {
            return Err(invalid("telemetry.interval_ms must be between 1 and 60000"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("logging.level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> RcioError {
    RcioError::Config(toml::de::Error::custom(msg))
}
