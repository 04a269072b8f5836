//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{MonitorError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Device selection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    #[serde(default = "default_device_id")]
    pub id: String,

    #[serde(default = "default_verify_timeout_ms")]
    pub verify_timeout_ms: u64,
}

/// Telemetry stream configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    #[serde(default = "default_backlog_limit")]
    pub backlog_limit: usize,

    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Live session configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_live_window_size")]
    pub live_window_size: usize,

    #[serde(default = "default_error_display_ms")]
    pub error_display_ms: u64,

    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,
}

/// Session history storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: String,
}

/// CSV export configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_export_enabled")]
    pub enabled: bool,

    #[serde(default = "default_export_dir")]
    pub dir: String,
}

/// Simulated device configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SimulatorConfig {
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    #[serde(default = "default_base_rpm")]
    pub base_rpm: f64,

    #[serde(default = "default_amplitude_rpm")]
    pub amplitude_rpm: f64,

    #[serde(default = "default_run_duration_s")]
    pub run_duration_s: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write logs to daily-rotated files here when set
    #[serde(default)]
    pub log_dir: Option<String>,
}

// Default value functions
fn default_device_id() -> String { "tacho-001".to_string() }
fn default_verify_timeout_ms() -> u64 { 5000 }

fn default_backlog_limit() -> usize { 60 }
fn default_channel_capacity() -> usize { 64 }

fn default_live_window_size() -> usize { 30 }
fn default_error_display_ms() -> u64 { 5000 }
fn default_status_interval_ms() -> u64 { 2000 }

fn default_storage_path() -> String { "./data/tachometer-sessions.json".to_string() }

fn default_export_enabled() -> bool { true }
fn default_export_dir() -> String { "./exports".to_string() }

fn default_sample_interval_ms() -> u64 { 500 }
fn default_base_rpm() -> f64 { 450.0 }
fn default_amplitude_rpm() -> f64 { 250.0 }
fn default_run_duration_s() -> u64 { 30 }

fn default_log_level() -> String { "info".to_string() }

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            id: default_device_id(),
            verify_timeout_ms: default_verify_timeout_ms(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            backlog_limit: default_backlog_limit(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            live_window_size: default_live_window_size(),
            error_display_ms: default_error_display_ms(),
            status_interval_ms: default_status_interval_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path: default_storage_path() }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: default_export_enabled(),
            dir: default_export_dir(),
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval_ms(),
            base_rpm: default_base_rpm(),
            amplitude_rpm: default_amplitude_rpm(),
            run_duration_s: default_run_duration_s(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            stream: StreamConfig::default(),
            session: SessionConfig::default(),
            storage: StorageConfig::default(),
            export: ExportConfig::default(),
            simulator: SimulatorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> MonitorError {
    MonitorError::Config(toml::de::Error::custom(message))
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
    /// use tachometer_monitor::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Bound on device existence checks
    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.device.verify_timeout_ms)
    }

    /// How long a toggle failure stays visible
    pub fn error_display(&self) -> Duration {
        Duration::from_millis(self.session.error_display_ms)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.device.id.trim().is_empty() {
            return Err(invalid("device id cannot be empty"));
        }

        if self.device.verify_timeout_ms == 0 || self.device.verify_timeout_ms > 60000 {
            return Err(invalid("verify_timeout_ms must be between 1 and 60000"));
        }

        if self.stream.backlog_limit == 0 || self.stream.backlog_limit > 10000 {
            return Err(invalid("backlog_limit must be between 1 and 10000"));
        }

        if self.stream.channel_capacity == 0 {
            return Err(invalid("channel_capacity must be greater than 0"));
        }

        if self.session.live_window_size == 0 || self.session.live_window_size > 1000 {
            return Err(invalid("live_window_size must be between 1 and 1000"));
        }

        if self.session.error_display_ms == 0 || self.session.error_display_ms > 60000 {
            return Err(invalid("error_display_ms must be between 1 and 60000"));
        }

        if self.session.status_interval_ms == 0 {
            return Err(invalid("status_interval_ms must be greater than 0"));
        }

        if self.storage.path.is_empty() {
            return Err(invalid("storage path cannot be empty"));
        }

        if self.export.enabled && self.export.dir.is_empty() {
            return Err(invalid("export dir cannot be empty when enabled"));
        }

        if self.simulator.sample_interval_ms == 0 || self.simulator.sample_interval_ms > 60000 {
            return Err(invalid("sample_interval_ms must be between 1 and 60000"));
        }

        if self.simulator.base_rpm < 0.0 || self.simulator.amplitude_rpm < 0.0 {
            return Err(invalid("simulator rpm values cannot be negative"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid(format!(
                "log level must be one of: trace, debug, info, warn, error (got '{}')",
                self.logging.level
            )));
        }

        if matches!(&self.logging.log_dir, Some(dir) if dir.is_empty()) {
            return Err(invalid("log_dir cannot be empty when set"));
        }

        Ok(())
    }
}
