//! Periodic polling of the light's state.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::codec::ValueCodec;
use crate::config::BridgeConfig;
use crate::device::{DeviceError, DeviceSession};
use crate::telemetry::TelemetrySink;

/// Reads the light's channel labels and power levels on a fixed interval,
/// printing each reading and forwarding it to telemetry.
pub struct PollLoop {
    address: String,
    codec: ValueCodec,
    interval: Duration,
    sink: TelemetrySink,
}

impl PollLoop {
    pub fn new(config: &BridgeConfig, sink: TelemetrySink) -> Self {
        Self {
            address: config.device.address.clone(),
            codec: ValueCodec::new(config.device.multiplier),
            interval: Duration::from_secs(config.run.interval_secs),
            sink,
        }
    }

    /// Poll forever, or exactly once when the interval is zero.
    pub async fn run(self) {
        if self.interval.is_zero() {
            if let Err(e) = self.poll_once().await {
                error!("Poll failed: {}", e);
            }
            return;
        }
        info!("Polling {} every {}s", self.address, self.interval.as_secs());
        loop {
            if let Err(e) = self.poll_once().await {
                warn!("Poll failed: {}", e);
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    async fn poll_once(&self) -> Result<(), DeviceError> {
        let mut session = DeviceSession::open(&self.address, self.codec).await?;
        let power = session.relative_power().await?;
        let wavelengths = session.wavelengths().await?;
        if let Err(e) = self.sink.forward(&wavelengths, &power).await {
            warn!("Telemetry write failed: {}", e);
        }
        println!("wavelengths:\t{:?}", wavelengths);
        println!("power:\t\t{:?}", power);
        Ok(())
    }
}
