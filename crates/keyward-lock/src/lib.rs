//! Keyward Lock - distributed mutual exclusion over an atomic key-value store
//!
//! This crate provides:
//! - Lock keys and unguessable ownership tokens
//! - Three acquisition strategies behind one interface:
//!   - `NaiveLock`: timestamp value with get-and-set takeover (illustrative only)
//!   - `AtomicNxLock`: set-if-absent with TTL, compare-and-delete release
//!   - `LeasedLock`: short lease kept alive by a background watchdog
//! - Blocking acquisition with capped exponential backoff (`LockClient`)
//! - Layered configuration and lock statistics
//!
//! The store is the only source of truth for ownership. Client-side state is
//! an advisory cache; every ownership decision is confirmed by an atomic
//! compare in the store.

mod atomic;
mod client;
mod config;
mod error;
mod key;
mod leased;
mod naive;
mod protocol;
mod retry;
mod stats;
mod token;
mod watchdog;

pub use atomic::AtomicNxLock;
pub use client::LockClient;
pub use config::{LockConfig, RetryConfig};
pub use error::{LockError, LockResult};
pub use key::LockKey;
pub use leased::LeasedLock;
pub use naive::NaiveLock;
pub use protocol::{AcquireLock, LockState, OwnedLock, Strategy};
pub use retry::{Backoff, RetryPolicy};
pub use stats::{LockStats, LockStatsCollector};
pub use token::LockToken;
pub use watchdog::WatchdogSettings;

pub use keyward_common::{LeaseClock, StoreAdapter, StoreError};
