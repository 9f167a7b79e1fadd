//! Naive timestamp lock
//!
//! The stored value is the holder's deadline in Unix millis. A contender that
//! finds a deadline in the past takes the key over with get-and-set and wins
//! only if the previous value is still the deadline it read.
//!
//! Known weaknesses, kept deliberately:
//! - deadlines come from client clocks, so clients must be time-synchronized
//! - the expiry is attached in a second round trip; a crash in between leaves
//!   a key that never expires on its own
//! - a losing contender's get-and-set still overwrites the winner's deadline
//! - the value does not identify the owner, so there is no safe release

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use keyward_common::{LeaseClock, StoreAdapter};

use crate::error::{LockError, LockResult, validate_lease};
use crate::key::LockKey;
use crate::protocol::{AcquireLock, Strategy};
use crate::stats::LockStatsCollector;
use crate::token::LockToken;

#[derive(Clone)]
pub struct NaiveLock {
    store: Arc<dyn StoreAdapter>,
    clock: Arc<dyn LeaseClock>,
    stats: Arc<LockStatsCollector>,
}

impl NaiveLock {
    pub fn new(store: Arc<dyn StoreAdapter>, clock: Arc<dyn LeaseClock>) -> Self {
        Self {
            store,
            clock,
            stats: Arc::new(LockStatsCollector::new()),
        }
    }

    pub fn with_stats(mut self, stats: Arc<LockStatsCollector>) -> Self {
        self.stats = stats;
        self
    }

    async fn attempt(&self, key: &LockKey, lease: Duration) -> LockResult<Option<i64>> {
        let now = self.clock.now_millis();
        // Bounded by validate_lease, so this fits an i64
        let deadline = now.saturating_add(lease.as_millis() as i64);
        let value = deadline.to_string();

        if self.store.conditional_set(key.as_str(), &value, None).await? {
            self.attach_expiry(key, lease).await;
            return Ok(Some(deadline));
        }

        let Some(current) = self.store.get(key.as_str()).await? else {
            return Ok(None);
        };

        let current_deadline = match current.parse::<i64>() {
            Ok(deadline) => deadline,
            Err(_) => {
                warn!(key = %key, value = %current, "Lock value is not a deadline, treating as held");
                return Ok(None);
            }
        };
        if current_deadline >= now {
            return Ok(None);
        }

        // Presumed abandoned. Only the caller whose get-and-set returns the
        // deadline it just read wins the takeover.
        let previous = self.store.get_set(key.as_str(), &value).await?;
        if previous.as_deref() != Some(current.as_str()) {
            debug!(key = %key, "Lost takeover race for stale lock");
            return Ok(None);
        }

        debug!(key = %key, stale_deadline = current_deadline, "Took over stale lock");
        self.attach_expiry(key, lease).await;
        Ok(Some(deadline))
    }

    /// Best effort; a failure here leaves the key without an expiry
    async fn attach_expiry(&self, key: &LockKey, lease: Duration) {
        match self.store.expire(key.as_str(), lease).await {
            Ok(true) => {}
            Ok(false) => warn!(key = %key, "Lock key vanished before expiry could be attached"),
            Err(e) => warn!(key = %key, error = %e, "Failed to attach expiry to lock key"),
        }
    }
}

#[async_trait]
impl AcquireLock for NaiveLock {
    fn strategy(&self) -> Strategy {
        Strategy::Naive
    }

    fn stats(&self) -> &Arc<LockStatsCollector> {
        &self.stats
    }

    async fn try_acquire(&self, key: &LockKey, lease: Duration) -> LockResult<LockToken> {
        validate_lease(lease)?;

        let acquired = self.attempt(key, lease).await?;
        self.stats.record_acquire(Strategy::Naive, acquired.is_some());

        match acquired {
            Some(deadline) => {
                debug!(key = %key, deadline, "Naive lock acquired");
                Ok(LockToken::from_deadline(deadline))
            }
            None => Err(LockError::unavailable(key.as_str())),
        }
    }
}
