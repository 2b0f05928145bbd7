//! Bounded dead-letter history.

use std::collections::HashSet;

use tokio::sync::Mutex;
use tracing::warn;

use fieldops_core::UpdateId;

use crate::error::StoreError;
use crate::storage::{DEAD_LETTER_KEY, SharedKvStore, load_json, store_json};
use crate::types::FailedUpdate;

/// Durable list of mutations that left the queue, oldest first.
pub struct DeadLetterStore {
    kv: SharedKvStore,
    capacity: usize,
    lock: Mutex<()>,
}

impl DeadLetterStore {
    pub fn new(kv: SharedKvStore, capacity: usize) -> Self {
        Self {
            kv,
            capacity: capacity.max(1),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<FailedUpdate>, StoreError> {
        Ok(load_json(self.kv.as_ref(), DEAD_LETTER_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn append(&self, failed: FailedUpdate) -> Result<usize, StoreError> {
        self.append_all(vec![failed]).await
    }

    /// Append entries in one write, skipping ids already present and evicting the oldest
    /// entries beyond capacity. Returns the number evicted.
    pub async fn append_all(&self, failed: Vec<FailedUpdate>) -> Result<usize, StoreError> {
        if failed.is_empty() {
            return Ok(0);
        }

        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;

        let mut seen: HashSet<UpdateId> = entries.iter().map(FailedUpdate::id).collect();
        for entry in failed {
            if seen.insert(entry.id()) {
                entries.push(entry);
            }
        }

        let evicted = entries.len().saturating_sub(self.capacity);
        if evicted > 0 {
            for dropped in entries.drain(..evicted) {
                warn!(
                    update_id = %dropped.id(),
                    collection = %dropped.update.collection,
                    "dead-letter store full, evicting oldest entry"
                );
            }
        }

        store_json(self.kv.as_ref(), DEAD_LETTER_KEY, &entries).await?;
        Ok(evicted)
    }

    pub async fn read_all(&self) -> Result<Vec<FailedUpdate>, StoreError> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    pub async fn get(&self, id: UpdateId) -> Result<Option<FailedUpdate>, StoreError> {
        Ok(self.read_all().await?.into_iter().find(|f| f.id() == id))
    }

    /// Remove an entry. Returns `false` if it was not present.
    pub async fn remove(&self, id: UpdateId) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        let before = entries.len();
        entries.retain(|f| f.id() != id);
        if entries.len() == before {
            return Ok(false);
        }
        store_json(self.kv.as_ref(), DEAD_LETTER_KEY, &entries).await?;
        Ok(true)
    }

    pub async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read_all().await?.len())
    }
}

impl std::fmt::Debug for DeadLetterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeadLetterStore")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
