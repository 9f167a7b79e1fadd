//! Caller-facing lock client
//!
//! Wraps any strategy with the blocking acquisition policy: the non-blocking
//! acquire is retried with backoff until it succeeds or the caller's wait
//! budget runs out. Only `LockUnavailable` is retried; store failures are
//! returned at once so an outage is not mistaken for contention.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::config::LockConfig;
use crate::error::{LockError, LockResult};
use crate::key::LockKey;
use crate::protocol::{AcquireLock, OwnedLock};
use crate::retry::RetryPolicy;
use crate::stats::LockStatsCollector;
use crate::token::LockToken;

pub struct LockClient<L: ?Sized> {
    lock: Arc<L>,
    retry: RetryPolicy,
    stats: Arc<LockStatsCollector>,
}

impl<L: ?Sized> Clone for LockClient<L> {
    fn clone(&self) -> Self {
        Self {
            lock: self.lock.clone(),
            retry: self.retry,
            stats: self.stats.clone(),
        }
    }
}

impl<L: AcquireLock + ?Sized> LockClient<L> {
    /// Client recording into the lock's own stats collector
    pub fn new(lock: Arc<L>) -> Self {
        let stats = lock.stats().clone();
        Self {
            lock,
            retry: RetryPolicy::default(),
            stats,
        }
    }

    pub fn from_config(lock: Arc<L>, config: &LockConfig) -> LockResult<Self> {
        let retry = config.retry_policy();
        retry.validate()?;
        Ok(Self::new(lock).with_retry(retry))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_stats(mut self, stats: Arc<LockStatsCollector>) -> Self {
        self.stats = stats;
        self
    }

    pub fn lock(&self) -> &Arc<L> {
        &self.lock
    }

    /// Acquire `key` for `lease`.
    ///
    /// With `wait = None` a single attempt is made. Otherwise attempts are
    /// repeated until `wait` has elapsed, then `Timeout` is returned; a timed
    /// out acquisition leaves nothing behind in the store.
    pub async fn acquire(
        &self,
        key: &LockKey,
        lease: Duration,
        wait: Option<Duration>,
    ) -> LockResult<LockToken> {
        let Some(wait) = wait else {
            return self.lock.try_acquire(key, lease).await;
        };

        let started = Instant::now();
        let deadline = started + wait;
        let mut backoff = self.retry.backoff();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match self.lock.try_acquire(key, lease).await {
                Ok(token) => {
                    if attempts > 1 {
                        debug!(key = %key, attempts, "Lock acquired after waiting");
                    }
                    return Ok(token);
                }
                Err(LockError::LockUnavailable { .. }) => {}
                Err(e) => return Err(e),
            }

            let now = Instant::now();
            if now >= deadline {
                self.stats.record_timeout();
                debug!(key = %key, attempts, "Gave up waiting for lock");
                return Err(LockError::Timeout {
                    key: key.to_string(),
                    waited: now - started,
                });
            }
            sleep(backoff.next_delay().min(deadline - now)).await;
        }
    }
}

impl<L: OwnedLock + ?Sized> LockClient<L> {
    pub async fn renew(&self, key: &LockKey, token: &LockToken, lease: Duration) -> LockResult<()> {
        self.lock.renew(key, token, lease).await
    }

    pub async fn release(&self, key: &LockKey, token: &LockToken) -> LockResult<()> {
        self.lock.release(key, token).await
    }

    /// Run `critical_section` while holding `key`, then release it.
    ///
    /// The section's output is discarded with `LockLost` if the lease was
    /// lost before the release: its work was not protected by the lock.
    /// If the returned future is dropped early or the section panics, the
    /// release is spawned onto the runtime instead.
    pub async fn with_lock<F, Fut, T>(
        &self,
        key: &LockKey,
        lease: Duration,
        wait: Option<Duration>,
        critical_section: F,
    ) -> LockResult<T>
    where
        L: 'static,
        F: FnOnce(LockToken) -> Fut,
        Fut: Future<Output = T>,
    {
        let token = self.acquire(key, lease, wait).await?;
        let mut guard = ReleaseOnDrop {
            lock: self.lock.clone(),
            key: key.clone(),
            token: Some(token.clone()),
        };

        let output = critical_section(token.clone()).await;
        let released = self.lock.release(key, &token).await;
        guard.disarm();
        released?;
        Ok(output)
    }
}

/// Releases a lock held by `with_lock` when its future does not finish
struct ReleaseOnDrop<L: OwnedLock + ?Sized + 'static> {
    lock: Arc<L>,
    key: LockKey,
    token: Option<LockToken>,
}

impl<L: OwnedLock + ?Sized + 'static> ReleaseOnDrop<L> {
    fn disarm(&mut self) {
        self.token = None;
    }
}

impl<L: OwnedLock + ?Sized + 'static> Drop for ReleaseOnDrop<L> {
    fn drop(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        let Ok(handle) = Handle::try_current() else {
            warn!(key = %self.key, token = %token, "No runtime to release abandoned lock, lease will expire");
            return;
        };

        let lock = self.lock.clone();
        let key = self.key.clone();
        handle.spawn(async move {
            match lock.release(&key, &token).await {
                Ok(()) => debug!(key = %key, token = %token, "Released lock abandoned by critical section"),
                Err(e) => debug!(key = %key, token = %token, error = %e, "Release of abandoned lock failed"),
            }
        });
    }
}
