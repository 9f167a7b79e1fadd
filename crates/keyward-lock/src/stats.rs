//! Lock statistics
//!
//! Counters are kept in-process for `snapshot()` and mirrored to the
//! `metrics` facade so an installed recorder can export them.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::protocol::Strategy;

const ACQUIRE_TOTAL: &str = "keyward_lock_acquire_total";
const RELEASE_TOTAL: &str = "keyward_lock_release_total";
const RENEW_TOTAL: &str = "keyward_lock_renew_total";
const LOST_TOTAL: &str = "keyward_lock_lost_total";
const TIMEOUT_TOTAL: &str = "keyward_lock_timeout_total";
const WATCHDOGS_ACTIVE: &str = "keyward_lock_watchdogs_active";

/// Point-in-time lock statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockStats {
    /// Successful acquisitions
    pub acquisitions: u64,
    /// Acquisitions that found the key held
    pub failed_acquisitions: u64,
    /// Releases that deleted the key
    pub releases: u64,
    /// Releases that found the token no longer owned the key
    pub stale_releases: u64,
    /// Successful renewals (explicit or by a watchdog)
    pub renewals: u64,
    /// Locks observed lost by a renewal or a watchdog
    pub lost_locks: u64,
    /// Blocking acquisitions that ran out of wait time
    pub timeouts: u64,
}

#[derive(Debug, Default)]
pub struct LockStatsCollector {
    acquisitions: AtomicU64,
    failed_acquisitions: AtomicU64,
    releases: AtomicU64,
    stale_releases: AtomicU64,
    renewals: AtomicU64,
    lost_locks: AtomicU64,
    timeouts: AtomicU64,
}

impl LockStatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_acquire(&self, strategy: Strategy, acquired: bool) {
        let outcome = if acquired {
            self.acquisitions.fetch_add(1, Ordering::Relaxed);
            "acquired"
        } else {
            self.failed_acquisitions.fetch_add(1, Ordering::Relaxed);
            "unavailable"
        };
        metrics::counter!(ACQUIRE_TOTAL, "strategy" => strategy.as_str(), "outcome" => outcome)
            .increment(1);
    }

    pub(crate) fn record_release(&self, released: bool) {
        let outcome = if released {
            self.releases.fetch_add(1, Ordering::Relaxed);
            "released"
        } else {
            self.stale_releases.fetch_add(1, Ordering::Relaxed);
            "stale"
        };
        metrics::counter!(RELEASE_TOTAL, "outcome" => outcome).increment(1);
    }

    pub(crate) fn record_renew(&self, renewed: bool) {
        let outcome = if renewed {
            self.renewals.fetch_add(1, Ordering::Relaxed);
            "renewed"
        } else {
            "lost"
        };
        metrics::counter!(RENEW_TOTAL, "outcome" => outcome).increment(1);
    }

    pub(crate) fn record_lost(&self) {
        self.lost_locks.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(LOST_TOTAL).increment(1);
    }

    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(TIMEOUT_TOTAL).increment(1);
    }

    pub(crate) fn watchdog_started(&self) {
        metrics::gauge!(WATCHDOGS_ACTIVE).increment(1.0);
    }

    pub(crate) fn watchdog_stopped(&self) {
        metrics::gauge!(WATCHDOGS_ACTIVE).decrement(1.0);
    }

    pub fn snapshot(&self) -> LockStats {
        LockStats {
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            failed_acquisitions: self.failed_acquisitions.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            stale_releases: self.stale_releases.load(Ordering::Relaxed),
            renewals: self.renewals.load(Ordering::Relaxed),
            lost_locks: self.lost_locks.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}
