// Store test doubles shared by the integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use keyward_common::{StoreAdapter, StoreError, StoreResult, TokioClock};
use keyward_store::MemoryStore;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Store whose health can be switched at runtime
pub const HEALTHY: u8 = 0;
pub const FAILING: u8 = 1;
pub const HANGING: u8 = 2;
pub const SLOW: u8 = 3;

/// Round trip of a store in `SLOW` mode
pub const SLOW_ROUND_TRIP: Duration = Duration::from_secs(2);

/// Wraps a `MemoryStore`, counts renewals, and can fail or hang them
pub struct FlakyStore {
    pub inner: MemoryStore,
    mode: AtomicU8,
    extend_calls: AtomicUsize,
}

impl FlakyStore {
    /// Store on the tokio clock, so paused-time tests drive expiry too
    pub fn on_tokio_clock() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::with_clock(Arc::new(TokioClock::new())),
            mode: AtomicU8::new(HEALTHY),
            extend_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_mode(&self, mode: u8) {
        self.mode.store(mode, Ordering::SeqCst);
    }

    pub fn extend_calls(&self) -> usize {
        self.extend_calls.load(Ordering::SeqCst)
    }

    async fn check(&self) -> StoreResult<()> {
        match self.mode.load(Ordering::SeqCst) {
            FAILING => Err(StoreError::Unavailable("connection refused".to_string())),
            HANGING => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(StoreError::Timeout(Duration::from_secs(3600)))
            }
            SLOW => {
                tokio::time::sleep(SLOW_ROUND_TRIP).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl StoreAdapter for FlakyStore {
    async fn conditional_set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<bool> {
        self.check().await?;
        self.inner.conditional_set(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.check().await?;
        self.inner.get(key).await
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> StoreResult<bool> {
        self.check().await?;
        self.inner.compare_and_delete(key, expected).await
    }

    async fn compare_and_extend(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> StoreResult<bool> {
        self.extend_calls.fetch_add(1, Ordering::SeqCst);
        self.check().await?;
        self.inner.compare_and_extend(key, expected, ttl).await
    }

    async fn get_set(&self, key: &str, value: &str) -> StoreResult<Option<String>> {
        self.check().await?;
        self.inner.get_set(key, value).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        self.check().await?;
        self.inner.expire(key, ttl).await
    }
}
