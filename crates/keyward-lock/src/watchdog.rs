//! Lease renewal watchdog
//!
//! One background task per held lease. It renews every `interval` (a fraction
//! of the lease) until stopped, and gives up as soon as the store reports the
//! token no longer owns the key.
//!
//! The watchdog and release coordinate through a single `owned` flag. Whoever
//! swaps it from `true` to `false` first decides the outcome: release goes on
//! to delete the key, the watchdog records the lock as lost. Release then
//! waits for the task to exit so no renewal can be in flight when the delete
//! is issued.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tracing::{debug, error, warn};

use keyward_common::{DEFAULT_RENEW_RATIO, DEFAULT_RENEW_TIMEOUT_MS, DEFAULT_WATCHDOG_LEASE_MS};

use crate::atomic::AtomicNxLock;
use crate::error::{LockError, LockResult};
use crate::key::LockKey;
use crate::protocol::OwnedLock;
use crate::stats::LockStatsCollector;
use crate::token::LockToken;

/// Timing of a watchdog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogSettings {
    /// Lease written on acquire and on every renewal
    pub lease: Duration,
    /// Time between renewals; shorter than `lease`
    pub interval: Duration,
    /// Upper bound on a single renewal call
    pub renew_timeout: Duration,
}

impl WatchdogSettings {
    /// Renew every `lease / ratio`
    pub fn from_lease(lease: Duration, ratio: u32, renew_timeout: Duration) -> LockResult<Self> {
        if ratio < 2 {
            return Err(LockError::IllegalArgument(format!(
                "renew ratio must be at least 2, got {}",
                ratio
            )));
        }
        let settings = Self {
            lease,
            interval: lease / ratio,
            renew_timeout,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> LockResult<()> {
        if self.interval.is_zero() || self.interval >= self.lease {
            return Err(LockError::IllegalArgument(format!(
                "renew interval {:?} must be positive and shorter than lease {:?}",
                self.interval, self.lease
            )));
        }
        if self.renew_timeout.is_zero() {
            return Err(LockError::IllegalArgument(
                "renew timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        let lease = Duration::from_millis(DEFAULT_WATCHDOG_LEASE_MS);
        Self {
            lease,
            interval: lease / DEFAULT_RENEW_RATIO,
            renew_timeout: Duration::from_millis(DEFAULT_RENEW_TIMEOUT_MS),
        }
    }
}

/// Flags shared between a watchdog task and its owner
#[derive(Debug)]
struct Ownership {
    owned: AtomicBool,
    lost: AtomicBool,
}

impl Ownership {
    /// Check-and-clear. Returns true for the single caller that cleared it.
    fn relinquish(&self) -> bool {
        self.owned.swap(false, Ordering::AcqRel)
    }

    fn mark_lost(&self) -> bool {
        if self.relinquish() {
            self.lost.store(true, Ordering::Release);
            return true;
        }
        false
    }
}

/// Handle to a running renewal task
#[derive(Debug)]
pub(crate) struct Watchdog {
    key: LockKey,
    ownership: Arc<Ownership>,
    stop_tx: mpsc::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Start renewing `token`'s lease on `key`. Must be called inside a tokio runtime.
    ///
    /// `acquired_at` is when the acquiring set was sent; the first lease is
    /// counted from there.
    pub(crate) fn spawn(
        lock: AtomicNxLock,
        key: LockKey,
        token: LockToken,
        settings: WatchdogSettings,
        acquired_at: Instant,
        stats: Arc<LockStatsCollector>,
    ) -> Self {
        let ownership = Arc::new(Ownership {
            owned: AtomicBool::new(true),
            lost: AtomicBool::new(false),
        });
        let (stop_tx, stop_rx) = mpsc::channel(1);

        let task = RenewalTask {
            lock,
            key: key.clone(),
            token,
            settings,
            acquired_at,
            ownership: ownership.clone(),
            _active: ActiveGauge::new(stats.clone()),
            stats,
        };
        let handle = tokio::spawn(task.run(stop_rx));

        Self {
            key,
            ownership,
            stop_tx,
            handle: Some(handle),
        }
    }

    pub(crate) fn key(&self) -> &LockKey {
        &self.key
    }

    /// Whether the lease is still believed to be held (advisory)
    pub(crate) fn is_owned(&self) -> bool {
        self.ownership.owned.load(Ordering::Acquire)
    }

    /// Whether the watchdog (or a failed renew) observed the lease lost
    pub(crate) fn is_lost(&self) -> bool {
        self.ownership.lost.load(Ordering::Acquire)
    }

    /// Record an ownership loss observed outside the task and stop it
    pub(crate) fn mark_lost(&self) -> bool {
        let marked = self.ownership.mark_lost();
        let _ = self.stop_tx.try_send(());
        marked
    }

    /// Stop renewing and wait for the task to exit.
    ///
    /// Returns whether the lease was still owned at the moment of stopping;
    /// `false` means the watchdog had already observed the lock lost.
    pub(crate) async fn disarm(mut self) -> bool {
        let was_owned = self.ownership.relinquish();
        let _ = self.stop_tx.try_send(());

        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
            && e.is_panic()
        {
            error!(key = %self.key, "Lock watchdog panicked");
        }
        was_owned
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.ownership.relinquish();
            handle.abort();
        }
    }
}

struct RenewalTask {
    lock: AtomicNxLock,
    key: LockKey,
    token: LockToken,
    settings: WatchdogSettings,
    acquired_at: Instant,
    ownership: Arc<Ownership>,
    stats: Arc<LockStatsCollector>,
    _active: ActiveGauge,
}

impl RenewalTask {
    async fn run(self, mut stop_rx: mpsc::Receiver<()>) {
        let mut ticker = interval_at(
            self.acquired_at + self.settings.interval,
            self.settings.interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Latest instant the store-side lease is known to outlive
        let mut lease_deadline = self.acquired_at + self.settings.lease;

        loop {
            tokio::select! {
                _ = stop_rx.recv() => break,
                _ = ticker.tick() => {
                    if !self.ownership.owned.load(Ordering::Acquire) {
                        break;
                    }

                    let sent_at = Instant::now();
                    let outcome = timeout(
                        self.settings.renew_timeout,
                        self.lock.renew(&self.key, &self.token, self.settings.lease),
                    )
                    .await;

                    match outcome {
                        Ok(Ok(())) => {
                            lease_deadline = sent_at + self.settings.lease;
                            debug!(key = %self.key, token = %self.token, "Watchdog renewed lease");
                            continue;
                        }
                        Ok(Err(LockError::LockLost { .. })) => {
                            if self.ownership.mark_lost() {
                                self.stats.record_lost();
                                warn!(key = %self.key, token = %self.token, "Lock lost, watchdog stopping");
                            }
                            break;
                        }
                        Ok(Err(e)) => {
                            error!(key = %self.key, error = %e, "Watchdog renewal failed");
                        }
                        Err(_) => {
                            warn!(
                                key = %self.key,
                                timeout_ms = self.settings.renew_timeout.as_millis() as u64,
                                "Watchdog renewal timed out"
                            );
                        }
                    }

                    // Transient failure: keep trying until the last confirmed
                    // lease must have run out in the store.
                    if Instant::now() >= lease_deadline {
                        if self.ownership.mark_lost() {
                            self.stats.record_lost();
                            warn!(
                                key = %self.key,
                                token = %self.token,
                                "Lease elapsed without a successful renewal, watchdog stopping"
                            );
                        }
                        break;
                    }
                }
            }
        }
    }
}

/// Keeps the active-watchdog gauge balanced, including when the task is aborted
struct ActiveGauge(Arc<LockStatsCollector>);

impl ActiveGauge {
    fn new(stats: Arc<LockStatsCollector>) -> Self {
        stats.watchdog_started();
        Self(stats)
    }
}

impl Drop for ActiveGauge {
    fn drop(&mut self) {
        self.0.watchdog_stopped();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_lease() {
        let settings =
            WatchdogSettings::from_lease(Duration::from_secs(30), 3, Duration::from_secs(1)).unwrap();
        assert_eq!(settings.interval, Duration::from_secs(10));
        assert_eq!(WatchdogSettings::default(), settings);
    }

    #[test]
    fn test_settings_reject_bad_ratio() {
        assert!(WatchdogSettings::from_lease(Duration::from_secs(30), 1, Duration::from_secs(1)).is_err());
        assert!(WatchdogSettings::from_lease(Duration::from_secs(30), 3, Duration::ZERO).is_err());
        assert!(WatchdogSettings::from_lease(Duration::from_nanos(2), 3, Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_relinquish_is_single_winner() {
        let ownership = Ownership {
            owned: AtomicBool::new(true),
            lost: AtomicBool::new(false),
        };
        assert!(ownership.relinquish());
        assert!(!ownership.relinquish());
        assert!(!ownership.mark_lost());
        assert!(!ownership.lost.load(Ordering::Acquire));
    }
}
