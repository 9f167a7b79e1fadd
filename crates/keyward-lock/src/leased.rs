//! Leased lock with watchdog renewal
//!
//! Acquire writes a short lease and starts a watchdog that keeps extending it
//! while this process is alive, so a critical section may run for an unknown
//! time while a crashed holder still frees the key within one lease.
//!
//! The store only ever sees the configured short lease. The lease passed to
//! [`AcquireLock::try_acquire`] is validated and otherwise ignored: the hold
//! lasts until release, and recovery after a crash is bounded by the short
//! lease rather than by whatever the caller asked for.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use keyward_common::StoreAdapter;

use crate::atomic::AtomicNxLock;
use crate::config::LockConfig;
use crate::error::{LockError, LockResult, validate_lease};
use crate::key::LockKey;
use crate::protocol::{AcquireLock, LockState, OwnedLock, Strategy};
use crate::stats::LockStatsCollector;
use crate::token::LockToken;
use crate::watchdog::{Watchdog, WatchdogSettings};

#[derive(Clone)]
pub struct LeasedLock {
    lock: AtomicNxLock,
    settings: WatchdogSettings,
    /// Watchdog per live token, dropped (and aborted) with the last clone.
    /// Tokens are unique, so each binds exactly one key.
    watchdogs: Arc<DashMap<LockToken, Watchdog>>,
}

impl LeasedLock {
    pub fn new(store: Arc<dyn StoreAdapter>, settings: WatchdogSettings) -> LockResult<Self> {
        settings.validate()?;
        Ok(Self {
            lock: AtomicNxLock::new(store),
            settings,
            watchdogs: Arc::new(DashMap::new()),
        })
    }

    pub fn from_config(store: Arc<dyn StoreAdapter>, config: &LockConfig) -> LockResult<Self> {
        Self::new(store, config.watchdog_settings()?)
    }

    pub fn with_stats(mut self, stats: Arc<LockStatsCollector>) -> Self {
        self.lock = self.lock.with_stats(stats);
        self
    }

    pub fn settings(&self) -> &WatchdogSettings {
        &self.settings
    }

    /// Acquire with the configured watchdog lease
    pub async fn acquire(&self, key: &LockKey) -> LockResult<LockToken> {
        let settings = self.settings;
        let token = LockToken::generate();
        // The store-side lease starts no later than this
        let sent_at = Instant::now();
        self.lock
            .set_if_absent(key, &token, settings.lease, Strategy::Leased)
            .await?;

        // Bindings of lost leases are no longer useful once a new hold starts
        self.watchdogs.retain(|_, watchdog| watchdog.is_owned());

        let watchdog = Watchdog::spawn(
            self.lock.clone(),
            key.clone(),
            token.clone(),
            settings,
            sent_at,
            self.lock.stats().clone(),
        );
        self.watchdogs.insert(token.clone(), watchdog);
        debug!(
            key = %key,
            token = %token,
            interval_ms = settings.interval.as_millis() as u64,
            "Lock watchdog started"
        );
        Ok(token)
    }

    /// Advisory: whether this client's watchdog still believes `token` holds its lease
    pub fn is_held(&self, token: &LockToken) -> bool {
        self.watchdogs
            .get(token)
            .is_some_and(|watchdog| watchdog.is_owned())
    }

    fn watchdog_for<R>(
        &self,
        key: &LockKey,
        token: &LockToken,
        f: impl FnOnce(&Watchdog) -> R,
    ) -> Option<R> {
        self.watchdogs
            .get(token)
            .filter(|watchdog| watchdog.value().key() == key)
            .map(|watchdog| f(watchdog.value()))
    }

    /// Confirm `token` still owns `key`.
    ///
    /// Returns `LockLost` straight away once the watchdog has observed loss;
    /// otherwise asks the store.
    pub async fn check(&self, key: &LockKey, token: &LockToken) -> LockResult<()> {
        if self.watchdog_for(key, token, Watchdog::is_lost) == Some(true) {
            return Err(LockError::lost(key.as_str()));
        }

        if self.lock.state(key).await?.is_held_by(token) {
            Ok(())
        } else {
            Err(LockError::lost(key.as_str()))
        }
    }

    /// Number of watchdogs still renewing
    pub fn active_watchdogs(&self) -> usize {
        self.watchdogs.iter().filter(|w| w.is_owned()).count()
    }
}

#[async_trait]
impl AcquireLock for LeasedLock {
    fn strategy(&self) -> Strategy {
        Strategy::Leased
    }

    fn stats(&self) -> &Arc<LockStatsCollector> {
        self.lock.stats()
    }

    /// Writes the configured short lease; `lease` does not bound the hold
    async fn try_acquire(&self, key: &LockKey, lease: Duration) -> LockResult<LockToken> {
        validate_lease(lease)?;
        self.acquire(key).await
    }
}

#[async_trait]
impl OwnedLock for LeasedLock {
    async fn renew(&self, key: &LockKey, token: &LockToken, lease: Duration) -> LockResult<()> {
        if self.watchdog_for(key, token, Watchdog::is_owned) == Some(false) {
            return Err(LockError::lost(key.as_str()));
        }

        let result = self.lock.renew(key, token, lease).await;
        if let Err(LockError::LockLost { .. }) = &result
            && self.watchdog_for(key, token, Watchdog::mark_lost) == Some(true)
        {
            self.stats().record_lost();
        }
        result
    }

    async fn release(&self, key: &LockKey, token: &LockToken) -> LockResult<()> {
        // Stop renewing before deleting so no renewal races the release. A
        // key the token was never bound to leaves its watchdog running.
        if let Some((_, watchdog)) = self
            .watchdogs
            .remove_if(token, |_, watchdog| watchdog.key() == key)
            && !watchdog.disarm().await
        {
            self.stats().record_release(false);
            debug!(key = %key, token = %token, "Release after watchdog observed loss");
            return Err(LockError::lost(key.as_str()));
        }

        self.lock.release(key, token).await
    }

    async fn state(&self, key: &LockKey) -> LockResult<LockState> {
        self.lock.state(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyward_common::TokioClock;
    use keyward_store::MemoryStore;

    fn settings(lease_ms: u64) -> WatchdogSettings {
        WatchdogSettings::from_lease(Duration::from_millis(lease_ms), 3, Duration::from_millis(100))
            .unwrap()
    }

    fn leased_lock(lease_ms: u64) -> (LeasedLock, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::with_clock(Arc::new(TokioClock::new())));
        (LeasedLock::new(store.clone(), settings(lease_ms)).unwrap(), store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_starts_watchdog() {
        let (lock, _store) = leased_lock(3_000);
        let key = LockKey::new("foo").unwrap();

        let token = lock.acquire(&key).await.unwrap();
        assert!(lock.is_held(&token));
        assert_eq!(lock.active_watchdogs(), 1);

        lock.release(&key, &token).await.unwrap();
        assert!(!lock.is_held(&token));
        assert_eq!(lock.active_watchdogs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_acquire_writes_short_lease() {
        let (lock, store) = leased_lock(3_000);
        let key = LockKey::new("foo").unwrap();

        let token = lock.try_acquire(&key, Duration::from_secs(3600)).await.unwrap();
        assert_eq!(
            store.ttl("foo"),
            keyward_store::KeyTtl::Expires(Duration::from_secs(3))
        );

        tokio::time::sleep(Duration::from_secs(10)).await;
        lock.check(&key, &token).await.unwrap();

        // Holder goes away without releasing: the key frees within one short lease
        drop(lock);
        tokio::time::sleep(Duration::from_secs(3)).await;
        let rival = AtomicNxLock::new(store);
        rival.try_acquire(&key, Duration::from_secs(3)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_acquire_rejects_invalid_lease() {
        let (lock, store) = leased_lock(3_000);
        let key = LockKey::new("foo").unwrap();

        let err = lock.try_acquire(&key, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, LockError::IllegalArgument(_)));
        assert!(store.is_empty());
        assert_eq!(lock.active_watchdogs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_on_other_key_keeps_watchdog_running() {
        let (lock, store) = leased_lock(3_000);
        let held = LockKey::new("a").unwrap();
        let other = LockKey::new("b").unwrap();

        let token = lock.acquire(&held).await.unwrap();
        assert!(lock.release(&other, &token).await.unwrap_err().is_lost());
        assert!(lock.renew(&other, &token, Duration::from_secs(3)).await.unwrap_err().is_lost());
        assert!(lock.is_held(&token));
        assert_eq!(lock.active_watchdogs(), 1);

        // Still renewed well past the original lease
        tokio::time::sleep(Duration::from_secs(10)).await;
        lock.check(&held, &token).await.unwrap();
        assert_eq!(lock.stats().snapshot().lost_locks, 0);

        lock.release(&held, &token).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_renew_loss_stops_watchdog() {
        let (lock, store) = leased_lock(3_000);
        let key = LockKey::new("foo").unwrap();

        let token = lock.acquire(&key).await.unwrap();
        store.force_delete("foo");

        let err = lock.renew(&key, &token, Duration::from_secs(3)).await.unwrap_err();
        assert!(err.is_lost());
        assert!(!lock.is_held(&token));
        assert!(lock.check(&key, &token).await.unwrap_err().is_lost());
        assert!(lock.release(&key, &token).await.unwrap_err().is_lost());
        assert_eq!(lock.stats().snapshot().lost_locks, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_unknown_token_falls_back_to_store_compare() {
        let (lock, _store) = leased_lock(3_000);
        let key = LockKey::new("foo").unwrap();

        let token = lock.acquire(&key).await.unwrap();
        let stranger = LockToken::generate();

        assert!(lock.release(&key, &stranger).await.unwrap_err().is_lost());
        assert!(lock.is_held(&token));
        lock.release(&key, &token).await.unwrap();
    }
}
