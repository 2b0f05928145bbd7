#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use fieldops_offline::storage::QUEUE_KEY;
use fieldops_offline::{
    InMemoryBackend, InMemoryKvStore, KeyValueStore, NetworkMonitor, OfflineQueue, Payload,
    StoreError, SyncConfig,
};

pub fn payload(value: Value) -> Payload {
    value.as_object().cloned().expect("payload must be a JSON object")
}

pub struct Harness {
    pub kv: Arc<InMemoryKvStore>,
    pub backend: Arc<InMemoryBackend>,
    pub network: Arc<NetworkMonitor>,
    pub queue: Arc<OfflineQueue>,
}

pub fn harness(network: NetworkMonitor, config: SyncConfig) -> Harness {
    let kv = Arc::new(InMemoryKvStore::new());
    let backend = Arc::new(InMemoryBackend::new());
    let network = Arc::new(network);
    let queue = Arc::new(OfflineQueue::new(
        kv.clone(),
        backend.clone(),
        network.clone(),
        config,
    ));
    Harness {
        kv,
        backend,
        network,
        queue,
    }
}

/// Poll `check` until it holds, failing the test after ~10s.
pub async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..1_000 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

/// Key-value store that can be told to fail writes of the queue document.
#[derive(Default)]
pub struct FailingKv {
    inner: InMemoryKvStore,
    fail_queue_writes: AtomicBool,
}

impl FailingKv {
    pub fn fail_queue_writes(&self, fail: bool) {
        self.fail_queue_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStore for FailingKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        if key == QUEUE_KEY && self.fail_queue_writes.load(Ordering::SeqCst) {
            return Err(StoreError::backend("disk full"));
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key).await
    }
}
