use std::fmt::{Display, Formatter};

use keyward_common::KEY_SEPARATOR;

use crate::error::{LockError, LockResult};

/// Name of the resource a lock protects, as stored in the key-value store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockKey(String);

impl LockKey {
    /// Create a key from a raw store key. Blank keys are rejected.
    pub fn new(key: impl Into<String>) -> LockResult<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(LockError::IllegalArgument(
                "lock key must not be empty".to_string(),
            ));
        }
        Ok(Self(key))
    }

    /// Create a `namespace::name` key
    pub fn namespaced(namespace: &str, name: &str) -> LockResult<Self> {
        if namespace.trim().is_empty() || name.trim().is_empty() {
            return Err(LockError::IllegalArgument(
                "lock namespace and name must not be empty".to_string(),
            ));
        }
        Ok(Self(format!("{}{}{}", namespace, KEY_SEPARATOR, name)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for LockKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LockKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for LockKey {
    type Error = LockError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
