//! Queue contents survive a restart of the process.

mod common;

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;

use common::payload;
use fieldops_offline::{
    FileKvStore, InMemoryBackend, InMemoryKvStore, MutationAction, NetworkMonitor, OfflineQueue,
    PendingUpdate, SharedKvStore, SyncConfig,
};

const COLLECTIONS: [&str; 3] = ["tickets", "appointments", "customers"];

fn open_queue(kv: SharedKvStore) -> OfflineQueue {
    OfflineQueue::new(
        kv,
        Arc::new(InMemoryBackend::new()),
        Arc::new(NetworkMonitor::offline()),
        SyncConfig::default(),
    )
}

fn build(collection: usize, action: usize, record_id: String, n: i64) -> PendingUpdate {
    let collection = COLLECTIONS[collection];
    match action {
        0 => PendingUpdate::insert(collection, payload(json!({"n": n, "note": record_id}))),
        1 => PendingUpdate::update(collection, record_id, payload(json!({"n": n}))),
        _ => PendingUpdate::delete(collection, record_id),
    }
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn enqueued_items_read_back_in_order_after_restart(
        ops in prop::collection::vec((0usize..3, 0usize..3, "[a-z0-9]{1,8}", any::<i64>()), 0..20)
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let (built, ids, before, reloaded) = rt.block_on(async move {
            let kv = Arc::new(InMemoryKvStore::new());

            let queue = open_queue(kv.clone());
            let mut built = Vec::new();
            let mut ids = Vec::new();
            for (collection, action, record_id, n) in ops {
                let update = build(collection, action, record_id, n);
                built.push(update.clone());
                ids.push(queue.enqueue(update).await.unwrap());
            }
            let before = queue.pending().await.unwrap();
            drop(queue);

            let reopened = open_queue(kv);
            (built, ids, before, reopened.pending().await.unwrap())
        });

        prop_assert_eq!(&reloaded, &before);
        prop_assert_eq!(reloaded.iter().map(|u| u.id).collect::<Vec<_>>(), ids);
        prop_assert_eq!(reloaded.len(), built.len());
        for (stored, original) in reloaded.iter().zip(&built) {
            prop_assert_eq!(&stored.collection, &original.collection);
            prop_assert_eq!(stored.action, original.action);
            prop_assert_eq!(&stored.payload, &original.payload);
            prop_assert_eq!(&stored.record_id, &original.record_id);
        }
    }
}

#[tokio::test]
async fn file_store_keeps_queue_and_dead_letters_across_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let (pending, dead_id) = {
        let kv = Arc::new(FileKvStore::open(dir.path()).await.unwrap());
        let backend = Arc::new(InMemoryBackend::new());
        let queue = OfflineQueue::new(
            kv,
            backend,
            Arc::new(NetworkMonitor::online()),
            SyncConfig::default(),
        );

        // Permanently rejected: ends up dead-lettered.
        let dead_id = queue
            .enqueue(PendingUpdate::update("tickets", "gone", payload(json!({"status": "x"}))).unwrap())
            .await
            .unwrap();
        queue.sync().await.unwrap();

        queue.network().update_interface(false);
        for id in ["a1", "a2", "a3"] {
            queue
                .enqueue(PendingUpdate::delete("appointments", id).unwrap())
                .await
                .unwrap();
        }
        (queue.pending().await.unwrap(), dead_id)
    };

    let reopened = open_queue(Arc::new(FileKvStore::open(dir.path()).await.unwrap()));

    let reloaded = reopened.pending().await.unwrap();
    assert_eq!(reloaded, pending);
    assert!(reloaded.iter().all(|u| u.action == MutationAction::Delete));

    let failed = reopened.list_failed().await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id(), dead_id);

    let status = reopened.status().await.unwrap();
    assert_eq!(status.pending, 3);
    assert!(status.last_sync_attempt.is_some());
}
