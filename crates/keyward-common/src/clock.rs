//! Lease clocks
//!
//! Expiry instants are Unix milliseconds. The clock is injected wherever an
//! expiry is computed or compared so tests can drive virtual time.

use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Source of wall-clock time used to stamp and evaluate lease expiry
pub trait LeaseClock: Send + Sync + Debug {
    /// Current instant in Unix milliseconds
    fn now_millis(&self) -> i64;
}

/// Wall clock backed by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl LeaseClock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Wall clock that advances with the tokio timer.
///
/// Anchored at the wall time of construction and moved forward by the elapsed
/// tokio [`Instant`](tokio::time::Instant), so it follows paused or advanced
/// time in `tokio::test(start_paused = true)` runtimes.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    base_millis: i64,
    base: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            base_millis: chrono::Utc::now().timestamp_millis(),
            base: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl LeaseClock for TokioClock {
    fn now_millis(&self) -> i64 {
        self.base_millis + self.base.elapsed().as_millis() as i64
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl LeaseClock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
