//! Lock protocol interface
//!
//! All strategies share the acquisition interface. Only strategies whose
//! stored value identifies the owner also implement [`OwnedLock`]; the naive
//! strategy stores a bare deadline and so cannot release or renew safely.
//!
//! Per key the store cycles between two states:
//!
//! ```text
//! UNLOCKED --acquire--> HELD(token)
//! HELD(token) --release(token)--> UNLOCKED
//! HELD(token) --lease elapses--> UNLOCKED
//! HELD(token) --renew(token)--> HELD(token)
//! HELD(token) --acquire(other)--> HELD(token)   (acquire fails)
//! ```

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LockResult;
use crate::key::LockKey;
use crate::stats::LockStatsCollector;
use crate::token::LockToken;

/// Acquisition strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Timestamp value with get-and-set takeover of stale locks
    Naive,
    /// Set-if-absent with TTL, compare-and-delete release
    AtomicNx,
    /// AtomicNx with a short lease kept alive by a watchdog
    Leased,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Naive => "naive",
            Strategy::AtomicNx => "atomic_nx",
            Strategy::Leased => "leased",
        }
    }
}

impl Display for Strategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Observed store-side state of a lock key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Held { token: LockToken },
}

impl LockState {
    pub fn is_held_by(&self, token: &LockToken) -> bool {
        matches!(self, LockState::Held { token: held } if held == token)
    }
}

/// Non-blocking lock acquisition (shared by every strategy)
#[async_trait]
pub trait AcquireLock: Send + Sync {
    fn strategy(&self) -> Strategy;

    /// Collector this lock records its outcomes into
    fn stats(&self) -> &Arc<LockStatsCollector>;

    /// Try once to take `key` for `lease`.
    ///
    /// Fails with `LockUnavailable` if another live token holds the key.
    async fn try_acquire(&self, key: &LockKey, lease: Duration) -> LockResult<LockToken>;
}

/// Token-verified renew and release
#[async_trait]
pub trait OwnedLock: AcquireLock {
    /// Extend the lease to `lease` from now if `token` still owns `key`.
    ///
    /// Fails with `LockLost` otherwise. Never retried automatically.
    async fn renew(&self, key: &LockKey, token: &LockToken, lease: Duration) -> LockResult<()>;

    /// Delete `key` if `token` still owns it.
    ///
    /// Fails with `LockLost` when the lease already expired or was claimed by
    /// another token; the store is left untouched in that case.
    async fn release(&self, key: &LockKey, token: &LockToken) -> LockResult<()>;

    /// Read the current holder of `key` (advisory; may change immediately)
    async fn state(&self, key: &LockKey) -> LockResult<LockState>;
}
