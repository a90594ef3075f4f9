//! In-memory key-value store.
//!
//! Lost when the process exits. Used by tests and by the CLI's `--ephemeral`
//! mode.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{KeyValueStore, StorageResult};

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("mpin:alice").await.unwrap(), None);

        store.set("mpin:alice", "abc").await.unwrap();
        assert_eq!(store.get("mpin:alice").await.unwrap().as_deref(), Some("abc"));

        store.set("mpin:alice", "def").await.unwrap();
        assert_eq!(store.get("mpin:alice").await.unwrap().as_deref(), Some("def"));
        assert_eq!(store.len(), 1);

        store.remove("mpin:alice").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn removing_missing_key_is_ok() {
        let store = MemoryStore::new();
        assert!(store.remove("nothing").await.is_ok());
    }
}
