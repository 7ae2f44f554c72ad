//! Schedule execution against the light.

use chrono::Local;
use tracing::{info, warn};

use crate::codec::ValueCodec;
use crate::config::BridgeConfig;
use crate::device::{DeviceError, DeviceSession};
use crate::retry::RetryPolicy;
use crate::schedule::ScheduleEntry;
use crate::telemetry::TelemetrySink;

/// Connection attempts per entry before it is abandoned.
const ENTRY_ATTEMPTS: u32 = 10;

/// Walks a schedule in file order, sleeping until each entry is due and then
/// applying it to the light.
pub struct ScheduleRunner {
    address: String,
    codec: ValueCodec,
    sink: TelemetrySink,
    retry: RetryPolicy,
}

impl ScheduleRunner {
    pub fn new(config: &BridgeConfig, sink: TelemetrySink) -> Self {
        Self {
            address: config.device.address.clone(),
            codec: ValueCodec::new(config.device.multiplier),
            sink,
            retry: RetryPolicy::immediate(ENTRY_ATTEMPTS),
        }
    }

    /// Run `entries` to completion and return.
    ///
    /// Entries already in the past are skipped, except that the most recent
    /// past entry is applied once before the first future entry, so the light
    /// starts from the state the schedule expects. A schedule with no future
    /// entries does nothing.
    pub async fn run(&self, entries: Vec<ScheduleEntry>) {
        info!("Starting schedule run with {} entries", entries.len());
        let mut caught_up = false;
        let mut last_past: Option<ScheduleEntry> = None;
        for entry in entries {
            if entry.due <= Local::now() {
                // Only the most recent past entry matters.
                last_past = Some(entry);
                continue;
            }
            if !caught_up {
                caught_up = true;
                if let Some(past) = last_past.take() {
                    info!("Catching up to entry due {}", past.due);
                    self.execute_with_retry(&past).await;
                }
            }
            let wait = (entry.due - Local::now()).to_std().unwrap_or_default();
            info!("Sleeping for {}s until {}", wait.as_secs(), entry.due);
            tokio::time::sleep(wait).await;
            self.execute_with_retry(&entry).await;
        }
        info!("Schedule exhausted, runner stopping");
    }

    async fn execute_with_retry(&self, entry: &ScheduleEntry) {
        if let Err(e) = self.retry.run(|| self.execute(entry)).await {
            warn!(
                "Giving up on entry due {} after {} attempts: {}",
                entry.due,
                self.retry.attempts(),
                e
            );
        }
    }

    async fn execute(&self, entry: &ScheduleEntry) -> Result<(), DeviceError> {
        let mut session = DeviceSession::open(&self.address, self.codec).await?;
        let labels = session.wavelengths().await?;
        let count = labels.len().min(entry.targets.len());
        if count < labels.len() || count < entry.targets.len() {
            warn!(
                "Light reports {} channels but entry has {} targets, truncating",
                labels.len(),
                entry.targets.len()
            );
        }
        session.set_relative_power(&entry.targets[..count]).await?;
        info!("Applied entry due {}: {:?}", entry.due, &entry.targets[..count]);
        if let Err(e) = self.sink.forward(&labels[..count], &entry.targets[..count]).await {
            warn!("Telemetry write failed: {}", e);
        }
        Ok(())
    }
}
