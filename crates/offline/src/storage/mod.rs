//! Durable key-value storage the queue is persisted in.
//!
//! The offline queue only needs three keys, each holding one JSON document that is replaced
//! as a whole. Every `set` must be atomic: after a crash the key holds either the previous or
//! the new value.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;

pub mod file;
pub mod memory;

pub use file::FileKvStore;
pub use memory::InMemoryKvStore;

/// Key holding the ordered list of pending mutations.
pub const QUEUE_KEY: &str = "offline_queue";

/// Key holding sync timestamps.
pub const STATUS_KEY: &str = "offline_queue_status";

/// Key holding the dead-letter history.
pub const DEAD_LETTER_KEY: &str = "failed_updates";

/// Key-value persistence collaborator.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Atomically replace the value under `key`.
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Remove `key`; removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Shared handle to a key-value store.
pub type SharedKvStore = Arc<dyn KeyValueStore>;

/// Read and decode a JSON document.
pub(crate) async fn load_json<T: DeserializeOwned>(
    kv: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match kv.get(key).await? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::corrupt(key, e)),
        None => Ok(None),
    }
}

/// Encode and store a JSON document.
pub(crate) async fn store_json<T: Serialize + ?Sized>(
    kv: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(value).map_err(StoreError::Encode)?;
    kv.set(key, &bytes).await
}
