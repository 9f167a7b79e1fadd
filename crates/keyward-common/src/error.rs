//! Error types for the store boundary

use std::time::Duration;

/// Failures reported by a [`StoreAdapter`](crate::StoreAdapter) implementation.
///
/// These describe the store itself being unreachable or misbehaving, never
/// lock contention. The lock protocol propagates them unchanged.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid store argument: {0}")]
    InvalidArgument(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
