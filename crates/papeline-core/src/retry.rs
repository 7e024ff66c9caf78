//! Retry with exponential backoff

use std::time::Duration;

use indicatif::ProgressBar;

use crate::error::Retryable;
use crate::http::HttpConfig;

/// Bounded retry schedule: `max_attempts` tries in total, sleeping
/// `base_delay * 2^(attempt-1)` after each retryable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&HttpConfig::default())
    }
}

impl From<&HttpConfig> for RetryPolicy {
    fn from(config: &HttpConfig) -> Self {
        Self::new(config.max_retries.max(1), config.backoff)
    }
}

/// Retry a fallible operation with exponential backoff.
///
/// `attempt_fn` receives the 1-based attempt number. On retryable errors,
/// logs the failure, updates the progress bar, sleeps, and retries until
/// `policy.max_attempts` is reached.
///
/// Returns `Ok(T)` on first success, or the final `Err` on exhaustion / non-retryable error.
pub fn retry_with_backoff<T, E>(
    label: &str,
    policy: &RetryPolicy,
    pb: &ProgressBar,
    mut attempt_fn: impl FnMut(u32) -> Result<T, E>,
) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match attempt_fn(attempt) {
            Ok(v) => return Ok(v),
            Err(e) if attempt < max_attempts && e.is_retryable() => {
                let delay = policy.backoff_duration(attempt);
                log::warn!("{label}: attempt {attempt}/{max_attempts} failed: {e}, retrying in {delay:?}");
                pb.set_message(format!("retry {}/{max_attempts}...", attempt + 1));
                std::thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => {
                log::debug!("{label}: giving up after {attempt} attempt(s): {e}");
                return Err(e);
            }
        }
    }
}
