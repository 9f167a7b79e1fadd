//! Keyward Common - Shared types, traits, and clocks
//!
//! This crate provides the foundational types used across all Keyward components:
//! - Store error taxonomy
//! - The `StoreAdapter` boundary consumed by the lock protocol
//! - Lease clocks (wall, tokio-driven, and manual)
//! - Common constants

pub mod clock;
pub mod error;
pub mod traits;

// Re-exports for convenience
pub use clock::{LeaseClock, ManualClock, SystemClock, TokioClock};
pub use error::{StoreError, StoreResult};
pub use traits::StoreAdapter;

/// Default namespace used when no namespace is specified
pub const DEFAULT_NAMESPACE: &str = "public";

/// Separator between namespace and lock name in a store key
pub const KEY_SEPARATOR: &str = "::";

/// Default lease in milliseconds (30 seconds)
pub const DEFAULT_LEASE_MS: u64 = 30_000;

/// Longest lease a lock accepts (30 days)
pub const MAX_LEASE_MS: u64 = 30 * 24 * 60 * 60 * 1_000;

/// Default watchdog lease in milliseconds, renewed every third of it
pub const DEFAULT_WATCHDOG_LEASE_MS: u64 = 30_000;

/// Renew at 1/3 of the lease duration
pub const DEFAULT_RENEW_RATIO: u32 = 3;

/// Per-call timeout for a watchdog renewal
pub const DEFAULT_RENEW_TIMEOUT_MS: u64 = 1_000;
