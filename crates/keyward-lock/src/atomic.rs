//! Atomic set-if-absent lock
//!
//! Acquire writes the token and its TTL in one store step, so there is never
//! a key without an expiry. Release and renew compare the stored value to the
//! token inside the store; a late release from a holder whose lease expired
//! and was re-acquired by someone else never deletes the new holder's key.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use keyward_common::StoreAdapter;

use crate::error::{LockError, LockResult, validate_lease};
use crate::key::LockKey;
use crate::protocol::{AcquireLock, LockState, OwnedLock, Strategy};
use crate::stats::LockStatsCollector;
use crate::token::LockToken;

#[derive(Clone)]
pub struct AtomicNxLock {
    store: Arc<dyn StoreAdapter>,
    stats: Arc<LockStatsCollector>,
}

impl AtomicNxLock {
    pub fn new(store: Arc<dyn StoreAdapter>) -> Self {
        Self {
            store,
            stats: Arc::new(LockStatsCollector::new()),
        }
    }

    pub fn with_stats(mut self, stats: Arc<LockStatsCollector>) -> Self {
        self.stats = stats;
        self
    }

    /// Try to take `key` with a caller-supplied token.
    ///
    /// No takeover path: if the key exists the attempt fails and liveness
    /// relies solely on the holder's TTL.
    pub async fn try_acquire_with(
        &self,
        key: &LockKey,
        token: &LockToken,
        lease: Duration,
    ) -> LockResult<()> {
        self.set_if_absent(key, token, lease, Strategy::AtomicNx).await
    }

    pub(crate) async fn set_if_absent(
        &self,
        key: &LockKey,
        token: &LockToken,
        lease: Duration,
        strategy: Strategy,
    ) -> LockResult<()> {
        validate_lease(lease)?;

        let acquired = self
            .store
            .conditional_set(key.as_str(), token.as_str(), Some(lease))
            .await?;
        self.stats.record_acquire(strategy, acquired);

        if !acquired {
            return Err(LockError::unavailable(key.as_str()));
        }
        debug!(key = %key, token = %token, strategy = %strategy, "Lock acquired");
        Ok(())
    }
}

#[async_trait]
impl AcquireLock for AtomicNxLock {
    fn strategy(&self) -> Strategy {
        Strategy::AtomicNx
    }

    fn stats(&self) -> &Arc<LockStatsCollector> {
        &self.stats
    }

    async fn try_acquire(&self, key: &LockKey, lease: Duration) -> LockResult<LockToken> {
        let token = LockToken::generate();
        self.try_acquire_with(key, &token, lease).await?;
        Ok(token)
    }
}

#[async_trait]
impl OwnedLock for AtomicNxLock {
    async fn renew(&self, key: &LockKey, token: &LockToken, lease: Duration) -> LockResult<()> {
        validate_lease(lease)?;

        let renewed = self
            .store
            .compare_and_extend(key.as_str(), token.as_str(), lease)
            .await?;
        self.stats.record_renew(renewed);

        if !renewed {
            return Err(LockError::lost(key.as_str()));
        }
        debug!(key = %key, token = %token, lease_ms = lease.as_millis() as u64, "Lock renewed");
        Ok(())
    }

    async fn release(&self, key: &LockKey, token: &LockToken) -> LockResult<()> {
        let released = self
            .store
            .compare_and_delete(key.as_str(), token.as_str())
            .await?;
        self.stats.record_release(released);

        if !released {
            debug!(key = %key, token = %token, "Stale release ignored");
            return Err(LockError::lost(key.as_str()));
        }
        debug!(key = %key, token = %token, "Lock released");
        Ok(())
    }

    async fn state(&self, key: &LockKey) -> LockResult<LockState> {
        Ok(match self.store.get(key.as_str()).await? {
            Some(value) => LockState::Held {
                token: LockToken::from_raw(value),
            },
            None => LockState::Unlocked,
        })
    }
}
