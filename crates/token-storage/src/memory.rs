//! In-memory storage backend.

use crate::{KeyValueStorage, StorageResult, StorageWrite};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Process-local storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.data.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn get_many(&self, keys: &[&str]) -> StorageResult<Vec<Option<String>>> {
        let data = self.data.lock();
        Ok(keys.iter().map(|key| data.get(*key).cloned()).collect())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self.data.lock().remove(key).is_some())
    }

    fn apply(&self, writes: &[StorageWrite]) -> StorageResult<()> {
        let mut data = self.data.lock();
        for write in writes {
            match write {
                StorageWrite::Set { key, value } => {
                    data.insert(key.clone(), value.clone());
                }
                StorageWrite::Delete { key } => {
                    data.remove(key);
                }
            }
        }
        Ok(())
    }
}
