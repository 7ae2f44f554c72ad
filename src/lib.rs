//! Helio Bridge
//!
//! Drives a Heliospectra LED light over its TCP control port and forwards
//! readings to a Telegraf socket listener:
//!
//! - [`poller`] - Periodic polling of channel labels and power levels
//! - [`runner`] - Replay of a timestamped schedule file against the light
//! - [`device`] - Command sessions on the control port
//! - [`protocol`] - Command constants and reply tokenizing
//! - [`codec`] - Intensity to device-unit conversion
//! - [`schedule`] - Schedule file parsing
//! - [`telemetry`] - Line-protocol forwarding over UDP
//! - [`retry`] - Fixed-count retry policies
//! - [`config`] - Configuration loading (JSON5 format)

pub mod codec;
pub mod config;
pub mod device;
pub mod poller;
pub mod protocol;
pub mod retry;
pub mod runner;
pub mod schedule;
pub mod telemetry;

// Re-export commonly used types at the crate root
pub use codec::ValueCodec;
pub use config::{BridgeConfig, ConfigError, LogFormat, LoggingConfig, RunMode};
pub use device::{DeviceError, DeviceSession};
pub use poller::PollLoop;
pub use retry::RetryPolicy;
pub use runner::ScheduleRunner;
pub use schedule::{ScheduleEntry, ScheduleError, load_schedule, parse_schedule};
pub use telemetry::{TelemetryError, TelemetrySink};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| {
                    ConfigError::Validation(format!("Failed to initialize tracing: {}", e))
                })?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| {
                    ConfigError::Validation(format!("Failed to initialize tracing: {}", e))
                })?;
        }
    }

    Ok(())
}
