use std::fmt::{Display, Formatter};

use uuid::Uuid;

/// Opaque value identifying one acquisition of a lock.
///
/// The token is what the store holds while the lock is owned; release and
/// renew only touch the key if the stored value still equals it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockToken(String);

impl LockToken {
    /// Fresh random token (UUID v4). Never reused.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap a caller-chosen token.
    ///
    /// The caller is responsible for uniqueness; a predictable token lets
    /// another party release the lock.
    pub fn from_raw(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Token of the naive strategy: its deadline in Unix millis
    pub(crate) fn from_deadline(deadline_millis: i64) -> Self {
        Self(deadline_millis.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for LockToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
