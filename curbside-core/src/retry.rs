//! Bounded exponential backoff for calls to rate-limited services.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::ports::PortError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// How often and how patiently to retry transient failures.
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Unit delay; retry `n` waits `base_delay * (2^n + 1)`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that retries without sleeping.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (0-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2_u32.saturating_pow(retry).saturating_add(1);
        self.base_delay.saturating_mul(factor)
    }

    /// Run `operation`, retrying while it fails with a transient error.
    ///
    /// # Errors
    ///
    /// Returns the first non-transient error unchanged, or [`PortError::Unavailable`]
    /// once every attempt was rate limited.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, PortError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PortError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_error = None;
        for attempt in 0..attempts {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    if attempt + 1 < attempts {
                        let delay = self.delay_for(attempt);
                        warn!(label, attempt, ?delay, "transient failure, backing off");
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(PortError::Unavailable(format!(
            "{label} failed after {attempts} attempts: {}",
            last_error.map_or_else(|| "no attempt made".to_owned(), |err| err.to_string())
        )))
    }
}
