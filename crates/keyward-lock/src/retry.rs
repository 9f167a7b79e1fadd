//! Client-side retry policy for blocking acquisition

use std::time::Duration;

use rand::Rng;

use crate::error::{LockError, LockResult};

/// Capped exponential backoff (fixed when `multiplier` is 1.0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    /// Sleep a random duration in `[delay / 2, delay]` instead of `delay`
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_backoff: delay,
            max_backoff: delay,
            multiplier: 1.0,
            jitter: false,
        }
    }

    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self {
            initial_backoff: initial,
            max_backoff: max,
            multiplier: 2.0,
            jitter: true,
        }
    }

    pub fn validate(&self) -> LockResult<()> {
        if self.initial_backoff.is_zero() {
            return Err(LockError::IllegalArgument(
                "initial backoff must be greater than zero".to_string(),
            ));
        }
        if self.max_backoff < self.initial_backoff {
            return Err(LockError::IllegalArgument(format!(
                "max backoff {:?} is shorter than initial backoff {:?}",
                self.max_backoff, self.initial_backoff
            )));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(LockError::IllegalArgument(format!(
                "backoff multiplier must be at least 1.0, got {}",
                self.multiplier
            )));
        }
        Ok(())
    }

    pub fn backoff(&self) -> Backoff {
        Backoff {
            policy: *self,
            next: self.initial_backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(Duration::from_millis(50), Duration::from_secs(1))
    }
}

/// Delay sequence of one blocking acquisition
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    next: Duration,
}

impl Backoff {
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next.min(self.policy.max_backoff);
        if self.policy.multiplier > 1.0 {
            self.next = delay
                .mul_f64(self.policy.multiplier)
                .min(self.policy.max_backoff);
        }

        if !self.policy.jitter {
            return delay;
        }
        let half = delay / 2;
        let spread = (delay - half).as_millis() as u64;
        half + Duration::from_millis(rand::rng().random_range(0..=spread))
    }
}
