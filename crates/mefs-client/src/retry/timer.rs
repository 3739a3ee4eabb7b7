//! Exponential backoff with jitter

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

/// Default number of attempts per request, the first included
pub const MAX_RETRY: u32 = 5;

/// Default base delay
pub const DEFAULT_RETRY_UNIT: Duration = Duration::from_secs(1);

/// Default upper bound on a single delay
pub const DEFAULT_RETRY_CAP: Duration = Duration::from_secs(30);

/// Full jitter: a delay may shrink anywhere down to zero
pub const MAX_JITTER: f64 = 1.0;

/// No jitter: delays are exact powers of two times the unit
pub const NO_JITTER: f64 = 0.0;

/// Delay schedule for one call.
///
/// Attempts are 1-based. Attempt 1 never waits; attempt `n >= 2` waits
/// `unit * 2^(n-2)`, capped at `cap`, minus a random share of up to
/// `jitter` of that value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryTimer {
    /// Attempts allowed, the first included
    pub max_attempts: u32,
    /// Base delay
    pub unit: Duration,
    /// Upper bound on a single delay
    pub cap: Duration,
    /// Jitter factor in `[0, 1]`
    pub jitter: f64,
}

impl Default for RetryTimer {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_UNIT, DEFAULT_RETRY_CAP, MAX_JITTER)
    }
}

impl RetryTimer {
    /// Build a timer; jitter outside `[0, 1]` is clamped
    pub fn new(unit: Duration, cap: Duration, jitter: f64) -> Self {
        let jitter = if jitter.is_nan() {
            NO_JITTER
        } else {
            jitter.clamp(NO_JITTER, MAX_JITTER)
        };
        Self {
            max_attempts: MAX_RETRY,
            unit,
            cap,
            jitter,
        }
    }

    /// Set the attempt budget
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Delay before `attempt` with jitter left out
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exp = (attempt - 2).min(31);
        self.unit.saturating_mul(1u32 << exp).min(self.cap)
    }

    /// Jittered delay before `attempt`
    pub fn delay(&self, attempt: u32) -> Duration {
        let sample: f64 = rand::thread_rng().gen();
        self.delay_with(attempt, sample)
    }

    /// Jittered delay using a caller supplied sample in `[0, 1)`
    pub fn delay_with(&self, attempt: u32, sample: f64) -> Duration {
        let base = self.backoff(attempt);
        if self.jitter == NO_JITTER || base.is_zero() {
            return base;
        }
        let cut = self.jitter * sample.clamp(0.0, 1.0);
        base.mul_f64(1.0 - cut).min(base)
    }
}

/// Waits between attempts
#[async_trait]
pub trait Delay: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// [`Delay`] on the tokio timer
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
