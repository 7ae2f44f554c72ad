//! Telegraf bridge for Heliospectra LED lights.
//!
//! Polls a light's channel labels and power levels and forwards readings to
//! Telegraf, or replays a schedule file of timestamped intensity targets
//! against the light.

use anyhow::{Context, Result};
use clap::Parser;
use helio_bridge::config::{BridgeConfig, RunMode};
use helio_bridge::poller::PollLoop;
use helio_bridge::runner::ScheduleRunner;
use helio_bridge::telemetry::TelemetrySink;
use helio_bridge::{LoggingConfig, schedule};
use std::path::PathBuf;
use tracing::info;

/// Telegraf bridge and schedule runner for Heliospectra lights.
#[derive(Parser, Debug)]
#[command(name = "helio-bridge")]
#[command(about = "Drives a Heliospectra light and forwards readings to Telegraf")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format)
    #[arg(short, long, default_value = "helio.json5")]
    config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = BridgeConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    // Initialize logging
    let log_config = LoggingConfig {
        level: args
            .log_level
            .clone()
            .unwrap_or_else(|| config.logging.level.clone()),
        format: config.logging.format,
    };
    helio_bridge::init_tracing(&log_config)
        .map_err(|e| anyhow::anyhow!("Failed to init tracing: {}", e))?;

    info!("Starting helio-bridge");
    info!("Loaded configuration from {:?}", args.config);
    info!("Light address: {}", config.device.address);
    info!("Local timezone offset: {}", chrono::Local::now().offset());

    let mode = config.run_mode()?;
    match &mode {
        RunMode::Schedule(path) => info!("Schedule file: {}", path.display()),
        RunMode::Poll => info!("Poll interval: {}s", config.run.interval_secs),
    }
    info!(
        "Telemetry to {} ({})",
        config.telemetry.endpoint,
        if config.telemetry.enabled {
            "enabled"
        } else {
            "disabled"
        }
    );

    let sink = TelemetrySink::new(&config.telemetry);
    match mode {
        RunMode::Schedule(path) => {
            let entries = schedule::load_schedule(&path)
                .with_context(|| format!("Failed to open schedule {:?}", path))?;
            ScheduleRunner::new(&config, sink).run(entries).await;
        }
        RunMode::Poll => {
            PollLoop::new(&config, sink).run().await;
        }
    }

    info!("helio-bridge stopped");
    Ok(())
}
