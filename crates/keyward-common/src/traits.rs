//! Store boundary trait
//!
//! The lock protocol depends only on this trait. Every method must execute as
//! a single indivisible step with respect to the other methods on the same
//! key; the protocol relies on that for mutual exclusion and never adds
//! client-side locking of its own.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreResult;

/// Atomic single-key primitives of a remote key-value store.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Set `key` to `value` only if `key` is absent.
    ///
    /// When `ttl` is given it is attached in the same step as the write, so
    /// there is never an observable value without an expiry.
    async fn conditional_set(&self, key: &str, value: &str, ttl: Option<Duration>)
    -> StoreResult<bool>;

    /// Read the current value of `key`
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Delete `key` iff its current value equals `expected`
    async fn compare_and_delete(&self, key: &str, expected: &str) -> StoreResult<bool>;

    /// Refresh the expiry of `key` to `ttl` iff its current value equals `expected`
    async fn compare_and_extend(&self, key: &str, expected: &str, ttl: Duration)
    -> StoreResult<bool>;

    /// Unconditionally overwrite `key` and return the previous value.
    ///
    /// Like a plain SET this drops any expiry on the key. Only the naive
    /// strategy uses it.
    async fn get_set(&self, key: &str, value: &str) -> StoreResult<Option<String>>;

    /// Attach an expiry to an existing key. Only the naive strategy uses it.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;
}

#[async_trait]
impl<T: StoreAdapter + ?Sized> StoreAdapter for Arc<T> {
    async fn conditional_set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<bool> {
        (**self).conditional_set(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key).await
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> StoreResult<bool> {
        (**self).compare_and_delete(key, expected).await
    }

    async fn compare_and_extend(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> StoreResult<bool> {
        (**self).compare_and_extend(key, expected, ttl).await
    }

    async fn get_set(&self, key: &str, value: &str) -> StoreResult<Option<String>> {
        (**self).get_set(key, value).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        (**self).expire(key, ttl).await
    }
}
