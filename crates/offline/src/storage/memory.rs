//! In-memory key-value store for tests/dev.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::KeyValueStore;
use crate::error::StoreError;

/// In-memory key-value store.
///
/// Values live only as long as the store, so "restarting" a process in tests means building
/// new queue components over the same `Arc<InMemoryKvStore>`.
#[derive(Debug, Default)]
pub struct InMemoryKvStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StoreError {
    StoreError::backend("in-memory store lock poisoned")
}

#[async_trait]
impl KeyValueStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_remove() {
        let kv = InMemoryKvStore::new();
        assert!(kv.get("k").await.unwrap().is_none());

        kv.set("k", b"one").await.unwrap();
        kv.set("k", b"two").await.unwrap();
        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some(&b"two"[..]));
        assert_eq!(kv.len(), 1);

        kv.remove("k").await.unwrap();
        kv.remove("k").await.unwrap();
        assert!(kv.is_empty());
    }
}
