//! Persistent queue of pending mutations.

use std::collections::{HashMap, HashSet, VecDeque};

use tokio::sync::Mutex;

use fieldops_core::UpdateId;

use crate::error::StoreError;
use crate::storage::{QUEUE_KEY, SharedKvStore, load_json, store_json};
use crate::types::PendingUpdate;

/// Ordered, durable list of pending mutations stored as one JSON document.
///
/// Every write replaces the whole list with a single `set`, and every operation runs under one
/// async lock so read-modify-write cycles from different tasks never interleave.
pub struct QueueStore {
    kv: SharedKvStore,
    lock: Mutex<()>,
}

impl QueueStore {
    pub fn new(kv: SharedKvStore) -> Self {
        Self {
            kv,
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<PendingUpdate>, StoreError> {
        Ok(load_json(self.kv.as_ref(), QUEUE_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Add a mutation to the tail of the queue.
    pub async fn append(&self, update: PendingUpdate) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut items = self.load().await?;
        items.push(update);
        store_json(self.kv.as_ref(), QUEUE_KEY, &items).await
    }

    /// Ordered snapshot of the queue.
    pub async fn read_all(&self) -> Result<Vec<PendingUpdate>, StoreError> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    /// Overwrite the queue with `items`, in order, in a single write.
    ///
    /// Sync passes go through [`QueueStore::commit_pass`] instead, which merges with appends made
    /// while the pass was running.
    pub async fn replace_all(&self, items: &[PendingUpdate]) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        store_json(self.kv.as_ref(), QUEUE_KEY, items).await
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.kv.remove(QUEUE_KEY).await
    }

    pub async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read_all().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len().await? == 0)
    }

    /// Write back the result of a sync pass over `snapshot_ids`.
    ///
    /// Snapshot items are replaced by their `retained` version or dropped when absent from it.
    /// Entries sharing an id are matched up in order, so none of them is collapsed.
    /// Items appended after the snapshot keep their place behind the retained ones, and retained
    /// items no longer present in the stored list (cleared mid-pass) are not resurrected.
    /// Returns the resulting queue length.
    pub async fn commit_pass(
        &self,
        snapshot_ids: &HashSet<UpdateId>,
        retained: Vec<PendingUpdate>,
    ) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;
        let current = self.load().await?;

        let mut by_id: HashMap<UpdateId, VecDeque<PendingUpdate>> = HashMap::new();
        for update in retained {
            by_id.entry(update.id).or_default().push_back(update);
        }

        let merged: Vec<PendingUpdate> = current
            .into_iter()
            .filter_map(|item| {
                if snapshot_ids.contains(&item.id) {
                    by_id.get_mut(&item.id).and_then(VecDeque::pop_front)
                } else {
                    Some(item)
                }
            })
            .collect();

        store_json(self.kv.as_ref(), QUEUE_KEY, &merged).await?;
        Ok(merged.len())
    }
}

impl std::fmt::Debug for QueueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueStore").finish_non_exhaustive()
    }
}
