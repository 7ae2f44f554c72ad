//! Fixed-count retry handling for device and telemetry writes.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Retries an operation a fixed number of times, optionally pausing between
/// attempts. Intermediate failures are logged at warn level; the final
/// failure is returned to the caller.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Retry back-to-back with no pause between attempts.
    pub const fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            delay: Duration::ZERO,
        }
    }

    /// Retry with a fixed pause between attempts.
    pub const fn spaced(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Number of attempts the policy will make, never less than one.
    pub fn attempts(&self) -> u32 {
        self.attempts.max(1)
    }

    /// Run `operation` until it succeeds or the attempts are used up.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let attempts = self.attempts();
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts => {
                    warn!("Attempt {}/{} failed: {}", attempt, attempts, e);
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
