//! Storage trait definitions.

use crate::StorageResult;

/// A single write inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageWrite {
    /// Insert or replace a value.
    Set { key: String, value: String },
    /// Remove a value if present.
    Delete { key: String },
}

impl StorageWrite {
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete { key: key.into() }
    }
}

/// Trait for key-value storage backends
pub trait KeyValueStorage: Send + Sync {
    /// Store a value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value. Returns whether a value was present.
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Retrieve several values, in the order of `keys`.
    ///
    /// The default reads keys one by one; backends that can serve them from
    /// one consistent read should override it.
    fn get_many(&self, keys: &[&str]) -> StorageResult<Vec<Option<String>>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    /// Check if a key exists
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Apply a batch of writes as one logical transaction.
    ///
    /// The default applies writes one by one; backends that can commit a
    /// batch atomically should override it.
    fn apply(&self, writes: &[StorageWrite]) -> StorageResult<()> {
        for write in writes {
            match write {
                StorageWrite::Set { key, value } => self.set(key, value)?,
                StorageWrite::Delete { key } => {
                    self.delete(key)?;
                }
            }
        }
        Ok(())
    }
}
