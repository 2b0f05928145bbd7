//! Persisted sync timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::storage::{STATUS_KEY, SharedKvStore, load_json, store_json};

/// Timestamps stored under `offline_queue_status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetadata {
    #[serde(default)]
    pub last_sync_attempt: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_successful_sync: Option<DateTime<Utc>>,
}

pub struct SyncMetadataStore {
    kv: SharedKvStore,
    lock: Mutex<()>,
}

impl SyncMetadataStore {
    pub fn new(kv: SharedKvStore) -> Self {
        Self {
            kv,
            lock: Mutex::new(()),
        }
    }

    pub async fn load(&self) -> Result<SyncMetadata, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(load_json(self.kv.as_ref(), STATUS_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn record_attempt(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.modify(|m| m.last_sync_attempt = Some(at)).await
    }

    pub async fn record_success(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.modify(|m| m.last_successful_sync = Some(at)).await
    }

    async fn modify(&self, f: impl FnOnce(&mut SyncMetadata)) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut meta: SyncMetadata = load_json(self.kv.as_ref(), STATUS_KEY)
            .await?
            .unwrap_or_default();
        f(&mut meta);
        store_json(self.kv.as_ref(), STATUS_KEY, &meta).await
    }
}

impl std::fmt::Debug for SyncMetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncMetadataStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryKvStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn attempt_and_success_are_tracked_separately() {
        let store = SyncMetadataStore::new(Arc::new(InMemoryKvStore::new()));
        assert_eq!(store.load().await.unwrap(), SyncMetadata::default());

        let t1 = Utc::now();
        store.record_attempt(t1).await.unwrap();
        let meta = store.load().await.unwrap();
        assert_eq!(meta.last_sync_attempt, Some(t1));
        assert!(meta.last_successful_sync.is_none());

        let t2 = Utc::now();
        store.record_success(t2).await.unwrap();
        let meta = store.load().await.unwrap();
        assert_eq!(meta.last_sync_attempt, Some(t1));
        assert_eq!(meta.last_successful_sync, Some(t2));
    }
}
