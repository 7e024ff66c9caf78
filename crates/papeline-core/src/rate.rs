//! Minimum spacing between consecutive request starts

use std::time::{Duration, Instant};

/// Enforces `min_interval` between the *starts* of consecutive requests.
///
/// A fast response does not shorten the wait: the next call to [`acquire`]
/// sleeps out whatever remains of the interval since the previous start.
///
/// [`acquire`]: RateLimiter::acquire
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_start: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_start: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Remaining wait before the next request may start.
    pub fn remaining(&self) -> Duration {
        match self.last_start {
            Some(prev) => self.min_interval.saturating_sub(prev.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Block until the next request may start, then mark it started.
    pub fn acquire(&mut self) {
        let wait = self.remaining();
        if !wait.is_zero() {
            log::debug!("rate limit: waiting {wait:?}");
            std::thread::sleep(wait);
        }
        self.last_start = Some(Instant::now());
    }
}
