//! Configuration for the helio bridge.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// The light to drive
    pub device: DeviceConfig,

    /// What to do and how often
    #[serde(default)]
    pub run: RunConfig,

    /// Where readings go
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration for the light's control port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Control port address, "host:port"
    pub address: String,

    /// Scale between user intensities and device power units (default: 10.0)
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Never control the light, only observe it (default: false)
    #[serde(default)]
    pub dummy: bool,
}

fn default_multiplier() -> f64 {
    10.0
}

/// Run mode configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Seconds between polls; zero polls once and exits (default: 600)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Schedule file to replay instead of polling
    #[serde(default)]
    pub schedule: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            schedule: None,
        }
    }
}

fn default_interval_secs() -> u64 {
    600
}

/// Telemetry forwarding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Forward readings at all (default: true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Telegraf socket listener, "host:port" (default: "telegraf:8092")
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Host identity tag
    #[serde(default)]
    pub host_tag: Option<String>,

    /// Group identity tag (default: "nonspc")
    #[serde(default = "default_group_tag")]
    pub group_tag: Option<String>,

    /// User identity tag
    #[serde(default)]
    pub user_tag: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            endpoint: default_endpoint(),
            host_tag: None,
            group_tag: default_group_tag(),
            user_tag: None,
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_endpoint() -> String {
    "telegraf:8092".to_string()
}

fn default_group_tag() -> Option<String> {
    Some("nonspc".to_string())
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text (default)
    #[default]
    Text,
    /// Structured JSON for log aggregation systems
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// What the bridge will spend its life doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Read the light's state on an interval and forward it.
    Poll,
    /// Replay the schedule file at the given path against the light.
    Schedule(PathBuf),
}

impl BridgeConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: BridgeConfig = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.address.is_empty() {
            return Err(ConfigError::Validation(
                "Device address cannot be empty".to_string(),
            ));
        }

        if !self.device.multiplier.is_finite() || self.device.multiplier <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "Multiplier must be a positive number, got {}",
                self.device.multiplier
            )));
        }

        Ok(())
    }

    /// Decide what to run.
    ///
    /// A schedule takes precedence over polling, unless dummy mode is on, in
    /// which case the schedule is ignored and the bridge only observes the
    /// light. With no schedule and telemetry disabled there is nothing left
    /// to do, which is an error.
    pub fn run_mode(&self) -> Result<RunMode, ConfigError> {
        if let Some(schedule) = &self.run.schedule {
            if !self.device.dummy {
                return Ok(RunMode::Schedule(schedule.clone()));
            }
        }
        if self.telemetry.enabled {
            return Ok(RunMode::Poll);
        }
        Err(ConfigError::Validation(
            "Nothing to do: telemetry disabled and no schedule to run".to_string(),
        ))
    }
}
