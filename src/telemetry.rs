//! Best-effort forwarding of light readings to Telegraf.
//!
//! Readings go out as InfluxDB line protocol over UDP, one datagram per
//! reading. Channel labels become field names: numeric labels are treated as
//! wavelengths in nanometres, except the white-channel colour temperature
//! which is labelled in kelvin.

use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::config::TelemetryConfig;
use crate::retry::RetryPolicy;

/// Measurement name under which readings are recorded.
pub const MEASUREMENT: &str = "helio-light";

/// Label the light reports for its white channel, in kelvin.
const COLOUR_TEMP_LABEL: i64 = 6500;

const WRITE_ATTEMPTS: u32 = 5;
const WRITE_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("got {labels} labels for {values} values")]
    LengthMismatch { labels: usize, values: usize },
    #[error("no usable fields in reading")]
    NoFields,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes readings to a Telegraf socket listener.
pub struct TelemetrySink {
    enabled: bool,
    endpoint: String,
    tags: Vec<(&'static str, String)>,
    retry: RetryPolicy,
}

impl TelemetrySink {
    pub fn new(config: &TelemetryConfig) -> Self {
        let mut tags = Vec::new();
        for (name, value) in [
            ("host", &config.host_tag),
            ("group", &config.group_tag),
            ("user", &config.user_tag),
        ] {
            if let Some(value) = value {
                if !value.is_empty() {
                    tags.push((name, value.clone()));
                }
            }
        }
        Self {
            enabled: config.enabled,
            endpoint: config.endpoint.clone(),
            tags,
            retry: RetryPolicy::spaced(WRITE_ATTEMPTS, WRITE_DELAY),
        }
    }

    /// Forward one reading, pairing each channel label with its value.
    ///
    /// Does nothing when the sink is disabled. Send failures are retried;
    /// a reading that cannot be encoded at all is rejected immediately.
    pub async fn forward(&self, labels: &[String], values: &[f64]) -> Result<(), TelemetryError> {
        if !self.enabled {
            return Ok(());
        }
        let line = self.encode_line(labels, values)?;
        self.retry.run(|| self.send(&line)).await?;
        debug!("Forwarded reading to {}", self.endpoint);
        Ok(())
    }

    fn encode_line(&self, labels: &[String], values: &[f64]) -> Result<String, TelemetryError> {
        if labels.len() != values.len() {
            return Err(TelemetryError::LengthMismatch {
                labels: labels.len(),
                values: values.len(),
            });
        }

        let mut line = String::from(MEASUREMENT);
        for (name, value) in &self.tags {
            line.push(',');
            line.push_str(name);
            line.push('=');
            line.push_str(&escape_tag_value(value));
        }

        let mut fields = Vec::new();
        for (label, value) in labels.iter().zip(values) {
            match field_name(label) {
                Some(name) => fields.push(format!("{name}={value}")),
                None => warn!("Skipping channel with non-numeric label '{}'", label),
            }
        }
        if fields.is_empty() {
            return Err(TelemetryError::NoFields);
        }
        line.push(' ');
        line.push_str(&fields.join(","));

        if let Some(ts) = chrono::Utc::now().timestamp_nanos_opt() {
            line.push(' ');
            line.push_str(&ts.to_string());
        }
        Ok(line)
    }

    async fn send(&self, line: &str) -> Result<(), std::io::Error> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket
            .send_to(line.as_bytes(), self.endpoint.as_str())
            .await?;
        Ok(())
    }
}

/// Field name for a channel label, or `None` for labels with no number in a
/// recognizable place.
fn field_name(label: &str) -> Option<String> {
    let n: i64 = label.trim().parse().ok()?;
    if n == COLOUR_TEMP_LABEL {
        Some(format!("{n}k"))
    } else {
        Some(format!("{n}nm"))
    }
}

fn escape_tag_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == ',' || c == '=' || c == ' ' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
