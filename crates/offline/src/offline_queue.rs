//! UI-facing queue surface.

use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tracing::info;

use fieldops_core::UpdateId;

use crate::backend::RemoteBackend;
use crate::config::SyncConfig;
use crate::engine::SyncEngine;
use crate::error::{QueueError, SyncError};
use crate::lifecycle::AppLifecycle;
use crate::network::NetworkMonitor;
use crate::scheduler::{SchedulerHandle, TriggerScheduler};
use crate::storage::SharedKvStore;
use crate::types::{FailedUpdate, PendingUpdate, QueueStatus, SyncOutcome};

/// Offline-first mutation queue.
///
/// Mutations are persisted on `enqueue` and applied later by [`SyncEngine`] passes, started
/// either by the scheduler or by a manual [`OfflineQueue::sync`].
pub struct OfflineQueue {
    engine: Arc<SyncEngine>,
    enqueued: Arc<Notify>,
    requeue_lock: Mutex<()>,
}

impl OfflineQueue {
    pub fn new(
        kv: SharedKvStore,
        backend: Arc<dyn RemoteBackend>,
        network: Arc<NetworkMonitor>,
        config: SyncConfig,
    ) -> Self {
        Self {
            engine: Arc::new(SyncEngine::new(kv, backend, network, config)),
            enqueued: Arc::new(Notify::new()),
            requeue_lock: Mutex::new(()),
        }
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub fn network(&self) -> &Arc<NetworkMonitor> {
        self.engine.network()
    }

    /// Validate and persist a mutation, then nudge the scheduler.
    ///
    /// The queued copy always gets a fresh id, an enqueue time of now and an empty retry
    /// history, whatever the caller passed in.
    pub async fn enqueue(&self, mut update: PendingUpdate) -> Result<UpdateId, QueueError> {
        update.validate()?;
        update.renew();
        let id = update.id;
        let collection = update.collection.clone();
        let action = update.action;

        self.engine.queue().append(update).await?;
        info!(update_id = %id, %collection, %action, "mutation enqueued");

        self.enqueued.notify_one();
        Ok(id)
    }

    /// Manual sync (pull-to-refresh).
    pub async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        self.engine.sync().await
    }

    pub async fn status(&self) -> Result<QueueStatus, QueueError> {
        let pending = self.engine.queue().len().await?;
        let dead_lettered = self.engine.dead_letters().len().await?;
        let meta = self.engine.metadata().load().await?;

        Ok(QueueStatus {
            pending,
            syncing: self.engine.is_syncing(),
            last_sync_attempt: meta.last_sync_attempt,
            last_successful_sync: meta.last_successful_sync,
            dead_lettered,
        })
    }

    /// Pending mutations in queue order, with their last error.
    pub async fn pending(&self) -> Result<Vec<PendingUpdate>, QueueError> {
        Ok(self.engine.queue().read_all().await?)
    }

    /// Drop every pending mutation without applying it.
    pub async fn clear(&self) -> Result<(), QueueError> {
        self.engine.queue().clear().await?;
        info!("offline queue cleared");
        Ok(())
    }

    pub async fn list_failed(&self) -> Result<Vec<FailedUpdate>, QueueError> {
        Ok(self.engine.dead_letters().read_all().await?)
    }

    /// Move a dead-lettered mutation back to the queue with a fresh retry budget.
    ///
    /// Returns `false` if no dead-lettered mutation has this id.
    pub async fn requeue(&self, id: UpdateId) -> Result<bool, QueueError> {
        let _guard = self.requeue_lock.lock().await;

        let Some(failed) = self.engine.dead_letters().get(id).await? else {
            return Ok(false);
        };

        let mut update = failed.update;
        update.reset_retries();
        self.engine.queue().append(update).await?;
        self.engine.dead_letters().remove(id).await?;
        info!(update_id = %id, "dead-lettered mutation requeued");

        self.enqueued.notify_one();
        Ok(true)
    }

    /// Permanently drop a dead-lettered mutation.
    pub async fn discard_failed(&self, id: UpdateId) -> Result<bool, QueueError> {
        let removed = self.engine.dead_letters().remove(id).await?;
        if removed {
            info!(update_id = %id, "dead-lettered mutation discarded");
        }
        Ok(removed)
    }

    /// Start the trigger scheduler for this queue.
    pub fn start_scheduler(&self, lifecycle: Arc<AppLifecycle>) -> SchedulerHandle {
        TriggerScheduler::new(self.engine.clone(), lifecycle, self.enqueued.clone()).spawn()
    }
}

impl std::fmt::Debug for OfflineQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineQueue")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}
