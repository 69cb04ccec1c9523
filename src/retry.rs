//! Bounded retry with fixed or exponential delay.

use crate::error::{CheckinError, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Delay growth between attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Same delay every time.
    #[default]
    Fixed,
    /// Delay doubles after each failure, capped at `max_delay_secs`.
    Exponential,
}

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failure, in seconds.
    pub delay_secs: u64,
    pub backoff: Backoff,
    /// Upper bound for exponential delays, in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_secs: 60,
            backoff: Backoff::Fixed,
            max_delay_secs: 900,
        }
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay_secs: delay.as_secs(),
            backoff: Backoff::Fixed,
            max_delay_secs: delay.as_secs(),
        }
    }

    pub fn exponential(max_attempts: u32, delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            delay_secs: delay.as_secs(),
            backoff: Backoff::Exponential,
            max_delay_secs: max_delay.as_secs(),
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let secs = match self.backoff {
            Backoff::Fixed => self.delay_secs,
            Backoff::Exponential => {
                let shift = attempt.saturating_sub(1).min(32);
                self.delay_secs
                    .saturating_mul(1u64 << shift)
                    .min(self.max_delay_secs.max(self.delay_secs))
            }
        };
        Duration::from_secs(secs)
    }

    /// # Errors
    ///
    /// Returns [`CheckinError::InvalidConfig`] when `max_attempts` is zero.
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(CheckinError::InvalidConfig(format!(
                "{name}: max_attempts must be at least 1"
            )));
        }
        Ok(())
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are exhausted. `op` receives the 1-based attempt number.
///
/// # Errors
///
/// Returns the last error once no further attempt will be made.
pub async fn run_with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => {
                error!("{label} failed with non-retryable error: {e}");
                return Err(e);
            }
            Err(e) if attempt >= max_attempts => {
                error!("{label} failed after {attempt} attempts, giving up: {e}");
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    "{label} attempt {attempt}/{max_attempts} failed: {e}; retrying in {}s",
                    delay.as_secs()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
