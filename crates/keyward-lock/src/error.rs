//! Lock error taxonomy

use std::time::Duration;

use keyward_common::{MAX_LEASE_MS, StoreError};

/// Outcomes of a lock operation other than success.
///
/// `LockUnavailable` and `LockLost` are expected protocol outcomes, not
/// faults: the first means the key is held by someone else, the second means
/// the caller's lease already expired or was claimed by another token.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("lock '{key}' is held by another owner")]
    LockUnavailable { key: String },

    #[error("lock '{key}' is no longer owned by this token")]
    LockLost { key: String },

    #[error("gave up waiting for lock '{key}' after {waited:?}")]
    Timeout { key: String, waited: Duration },

    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),

    #[error("caused: {0}")]
    IllegalArgument(String),
}

impl LockError {
    pub fn unavailable(key: impl Into<String>) -> Self {
        Self::LockUnavailable { key: key.into() }
    }

    pub fn lost(key: impl Into<String>) -> Self {
        Self::LockLost { key: key.into() }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::LockUnavailable { .. })
    }

    pub fn is_lost(&self) -> bool {
        matches!(self, Self::LockLost { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

pub type LockResult<T> = Result<T, LockError>;

/// Reject leases the store cannot represent
pub(crate) fn validate_lease(lease: Duration) -> LockResult<()> {
    if lease.as_millis() == 0 {
        return Err(LockError::IllegalArgument(
            "lease must be at least one millisecond".to_string(),
        ));
    }
    if lease > Duration::from_millis(MAX_LEASE_MS) {
        return Err(LockError::IllegalArgument(format!(
            "lease {:?} exceeds the maximum of {}ms",
            lease, MAX_LEASE_MS
        )));
    }
    Ok(())
}
