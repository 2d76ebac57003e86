//! Fixed pacing between quota-consuming remote calls.
//!
//! Not adaptive: the configured delay is a floor applied after every call,
//! with no backoff. Calls are made one at a time, so awaiting
//! [`RateLimiter::wait`] holds up the whole run.

use std::time::Duration;

/// Waits a fixed delay after each remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLimiter {
    delay: Duration,
}

impl RateLimiter {
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Builds a limiter from the configured number of seconds. Values too
    /// large for a [`Duration`] saturate to [`Duration::MAX`]; negative and
    /// NaN values disable pacing.
    #[must_use]
    pub fn from_secs_f64(secs: f64) -> Self {
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(if secs > 0.0 {
            Duration::MAX
        } else {
            Duration::ZERO
        });
        Self::new(delay)
    }

    /// A limiter that never waits.
    #[must_use]
    pub const fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Sleeps for the configured delay.
    pub async fn wait(&self) {
        if self.delay.is_zero() {
            return;
        }
        log::trace!("Rate limit: waiting {:?}", self.delay);
        tokio::time::sleep(self.delay).await;
    }
}
