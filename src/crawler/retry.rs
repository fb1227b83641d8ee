//! Retry executor for remote operations
//!
//! Every remote step (listing page, procedure page, document download) runs
//! through [`retry`]. Failed attempts sleep for a random interval; every
//! `long_sleep_every`-th failure sleeps for a longer one to ride out site
//! outages and rate limiting.

use crate::config::RetryConfig;
use crate::shutdown::Shutdown;
use crate::{HarvestError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Attempt budget and backoff ranges of one kind of remote operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Sleep after an ordinary failure
    pub sleep_range: (Duration, Duration),

    /// Sleep after every `long_sleep_every`-th failure
    pub long_sleep_range: (Duration, Duration),

    pub long_sleep_every: u32,
}

impl RetryPolicy {
    /// Policy for listing and procedure pages
    pub fn pages(config: &RetryConfig) -> Self {
        Self::with_attempts(config, config.max_attempts)
    }

    /// Policy for document downloads
    pub fn documents(config: &RetryConfig) -> Self {
        Self::with_attempts(config, config.download_max_attempts)
    }

    fn with_attempts(config: &RetryConfig, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            sleep_range: (
                Duration::from_secs(config.sleep_min_secs),
                Duration::from_secs(config.sleep_max_secs),
            ),
            long_sleep_range: (
                Duration::from_secs(config.long_sleep_min_secs),
                Duration::from_secs(config.long_sleep_max_secs),
            ),
            long_sleep_every: config.long_sleep_every,
        }
    }

    /// Delay before the attempt following failure number `failure` (1-based)
    pub fn backoff(&self, failure: u32) -> Duration {
        let (min, max) = if self.long_sleep_every > 0 && failure % self.long_sleep_every == 0 {
            self.long_sleep_range
        } else {
            self.sleep_range
        };

        let min_ms = min.as_millis() as u64;
        let max_ms = max.as_millis() as u64;
        if max_ms <= min_ms {
            return min;
        }
        Duration::from_millis(rand::rng().random_range(min_ms..=max_ms))
    }
}

/// Runs `operation` until it succeeds or the policy's budget is spent
///
/// # Arguments
///
/// * `policy` - Attempt budget and backoff ranges
/// * `shutdown` - Checked before each attempt and during sleeps
/// * `label` - Names the operation in log lines
/// * `operation` - Produces one attempt per call
///
/// # Returns
///
/// * `Ok(T)` - The first successful attempt
/// * `Err(HarvestError::Interrupted)` - Shutdown was requested between attempts
/// * `Err(e)` - A non-retryable error, or the last error once the budget is spent
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    shutdown: &Shutdown,
    label: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut failures = 0u32;

    loop {
        if shutdown.is_triggered() {
            return Err(HarvestError::Interrupted);
        }

        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => e,
        };

        failures += 1;
        if failures >= policy.max_attempts {
            tracing::error!(
                "{}: giving up after {} attempts: {}",
                label,
                failures,
                error
            );
            return Err(error);
        }

        let delay = policy.backoff(failures);
        tracing::warn!(
            "{}: attempt {}/{} failed: {}. Retrying in {}s",
            label,
            failures,
            policy.max_attempts,
            error,
            delay.as_secs()
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.triggered() => return Err(HarvestError::Interrupted),
        }
    }
}
