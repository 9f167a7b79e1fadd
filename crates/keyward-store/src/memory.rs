// In-memory TTL store
// Each primitive holds the key's shard lock for its whole duration, which is
// what makes conditional set, compare-and-delete and compare-and-extend atomic.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info};

use keyward_common::{LeaseClock, StoreAdapter, StoreError, StoreResult, SystemClock};

/// A stored value and its optional expiry (Unix millis)
#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<i64>,
}

impl StoredValue {
    fn new(value: &str, expires_at: Option<i64>) -> Self {
        Self {
            value: value.to_string(),
            expires_at,
        }
    }

    fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Remaining lifetime of a key, as reported by [`MemoryStore::ttl`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// Key does not exist (or has expired)
    Missing,
    /// Key exists without an expiry
    Persistent,
    /// Key expires after the given duration
    Expires(Duration),
}

/// In-memory store using DashMap
#[derive(Debug)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, StoredValue>>,
    clock: Arc<dyn LeaseClock>,
    sweeper: Option<tokio::task::JoinHandle<()>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a store driven by the system wall clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn LeaseClock>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock,
            sweeper: None,
        }
    }

    /// Start a background task that removes expired keys.
    ///
    /// Expired keys are already invisible to every primitive; the sweeper
    /// only reclaims their memory. Must be called inside a tokio runtime.
    pub fn with_sweeper(mut self, interval: Duration) -> Self {
        let entries = self.entries.clone();
        let clock = self.clock.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = Self::sweep_expired(&entries, clock.now_millis());
                if removed > 0 {
                    debug!(count = removed, "Swept expired store entries");
                }
            }
        });

        info!(interval_ms = interval.as_millis() as u64, "MemoryStore sweeper started");
        if let Some(previous) = self.sweeper.replace(handle) {
            previous.abort();
        }
        self
    }

    fn sweep_expired(entries: &DashMap<String, StoredValue>, now: i64) -> usize {
        let before = entries.len();
        entries.retain(|_, v| !v.is_expired(now));
        before.saturating_sub(entries.len())
    }

    /// Delete a key regardless of its value (operator action)
    pub fn force_delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Remaining lifetime of a key
    pub fn ttl(&self, key: &str) -> KeyTtl {
        let now = self.clock.now_millis();
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => match entry.expires_at {
                Some(at) => KeyTtl::Expires(Duration::from_millis((at - now) as u64)),
                None => KeyTtl::Persistent,
            },
            _ => KeyTtl::Missing,
        }
    }

    /// Number of stored entries, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn expiry_after(&self, now: i64, ttl: Duration) -> StoreResult<i64> {
        if ttl.is_zero() {
            return Err(StoreError::InvalidArgument(
                "ttl must be greater than zero".to_string(),
            ));
        }
        i64::try_from(ttl.as_millis())
            .ok()
            .and_then(|ttl_ms| now.checked_add(ttl_ms))
            .ok_or_else(|| StoreError::InvalidArgument(format!("ttl {:?} is out of range", ttl)))
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl StoreAdapter for MemoryStore {
    async fn conditional_set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<bool> {
        let now = self.clock.now_millis();
        let expires_at = ttl.map(|ttl| self.expiry_after(now, ttl)).transpose()?;

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_expired(now) {
                    return Ok(false);
                }
                occupied.insert(StoredValue::new(value, expires_at));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredValue::new(value, expires_at));
            }
        }
        Ok(true)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = self.clock.now_millis();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, v| v.is_expired(now));
        }
        Ok(None)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> StoreResult<bool> {
        let now = self.clock.now_millis();
        let removed = self
            .entries
            .remove_if(key, |_, v| !v.is_expired(now) && v.value == expected);
        Ok(removed.is_some())
    }

    async fn compare_and_extend(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> StoreResult<bool> {
        let now = self.clock.now_millis();
        let expires_at = self.expiry_after(now, ttl)?;

        match self.entries.get_mut(key) {
            Some(mut entry) if !entry.is_expired(now) && entry.value == expected => {
                entry.expires_at = Some(expires_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_set(&self, key: &str, value: &str) -> StoreResult<Option<String>> {
        let now = self.clock.now_millis();

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let previous = occupied.insert(StoredValue::new(value, None));
                Ok((!previous.is_expired(now)).then_some(previous.value))
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredValue::new(value, None));
                Ok(None)
            }
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let now = self.clock.now_millis();
        let expires_at = self.expiry_after(now, ttl)?;

        match self.entries.get_mut(key) {
            Some(mut entry) if !entry.is_expired(now) => {
                entry.expires_at = Some(expires_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
