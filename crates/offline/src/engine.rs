//! Synchronization engine: drains the queue against the remote backend.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tracing::{Instrument, debug, info, info_span, warn};

use fieldops_core::SyncRunId;

use crate::backend::{BackendError, RemoteBackend, apply_update};
use crate::config::SyncConfig;
use crate::dead_letter::DeadLetterStore;
use crate::error::SyncError;
use crate::network::NetworkMonitor;
use crate::queue_store::QueueStore;
use crate::scheduler::SyncTrigger;
use crate::status::SyncMetadataStore;
use crate::storage::SharedKvStore;
use crate::types::{DeadLetterReason, FailedUpdate, PendingUpdate, SyncOutcome, SyncSkipReason};

/// Holds the `syncing` flag for the duration of a pass; clears it on drop.
struct SyncGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SyncGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Applies queued mutations to the backend with retry and dead-letter policy.
///
/// At most one pass runs at a time; concurrent callers return immediately with
/// [`SyncSkipReason::AlreadyRunning`].
pub struct SyncEngine {
    queue: Arc<QueueStore>,
    dead_letters: Arc<DeadLetterStore>,
    metadata: Arc<SyncMetadataStore>,
    backend: Arc<dyn RemoteBackend>,
    network: Arc<NetworkMonitor>,
    config: SyncConfig,
    syncing: AtomicBool,
}

impl SyncEngine {
    pub fn new(
        kv: SharedKvStore,
        backend: Arc<dyn RemoteBackend>,
        network: Arc<NetworkMonitor>,
        config: SyncConfig,
    ) -> Self {
        Self {
            queue: Arc::new(QueueStore::new(kv.clone())),
            dead_letters: Arc::new(DeadLetterStore::new(kv.clone(), config.dead_letter_capacity)),
            metadata: Arc::new(SyncMetadataStore::new(kv)),
            backend,
            network,
            config,
            syncing: AtomicBool::new(false),
        }
    }

    pub fn queue(&self) -> &Arc<QueueStore> {
        &self.queue
    }

    pub fn dead_letters(&self) -> &Arc<DeadLetterStore> {
        &self.dead_letters
    }

    pub fn metadata(&self) -> &Arc<SyncMetadataStore> {
        &self.metadata
    }

    pub fn network(&self) -> &Arc<NetworkMonitor> {
        &self.network
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    /// Run one sync pass if online and no other pass is in flight.
    ///
    /// Per-mutation failures are folded into the outcome; only storage failures are returned
    /// as errors, in which case the queue is left as it was before the pass.
    pub async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        self.sync_for(SyncTrigger::Manual).await
    }

    /// [`SyncEngine::sync`] on behalf of a scheduler trigger.
    pub async fn sync_for(&self, trigger: SyncTrigger) -> Result<SyncOutcome, SyncError> {
        if !self.network.is_online() {
            debug!(?trigger, "sync skipped: offline");
            return Ok(SyncOutcome::skipped(SyncSkipReason::Offline));
        }

        let Some(guard) = SyncGuard::acquire(&self.syncing) else {
            debug!(?trigger, "sync skipped: pass already running");
            return Ok(SyncOutcome::skipped(SyncSkipReason::AlreadyRunning));
        };

        let run_id = SyncRunId::new();
        let span = info_span!("sync_pass", run_id = %run_id, ?trigger);
        let outcome = self.run_pass().instrument(span).await;
        drop(guard);

        let outcome = outcome?;
        if outcome.succeeded > 0 {
            if let Err(err) = self.metadata.record_success(Utc::now()).await {
                warn!(run_id = %run_id, error = %err, "failed to persist last successful sync");
            }
        }
        Ok(outcome)
    }

    async fn run_pass(&self) -> Result<SyncOutcome, SyncError> {
        self.metadata.record_attempt(Utc::now()).await?;

        let snapshot = self.queue.read_all().await?;
        if snapshot.is_empty() {
            debug!("queue empty");
            return Ok(SyncOutcome::default());
        }

        info!(pending = snapshot.len(), "sync pass started");
        let snapshot_ids: HashSet<_> = snapshot.iter().map(|u| u.id).collect();

        let mut outcome = SyncOutcome::default();
        let mut retained = Vec::new();
        let mut failed = Vec::new();

        for mut update in snapshot {
            match self.apply(&update).await {
                Ok(()) => {
                    outcome.succeeded += 1;
                    debug!(
                        update_id = %update.id,
                        collection = %update.collection,
                        action = %update.action,
                        "mutation applied"
                    );
                }
                Err(err) => {
                    outcome.failed += 1;
                    update.record_failure(err.to_string());

                    let permanent = err.is_permanent() && self.config.dead_letter_permanent;
                    if permanent || self.config.retries_exhausted(update.retry_count) {
                        let reason = if permanent {
                            DeadLetterReason::Permanent
                        } else {
                            DeadLetterReason::RetriesExhausted
                        };
                        warn!(
                            update_id = %update.id,
                            collection = %update.collection,
                            retry_count = update.retry_count,
                            ?reason,
                            error = %err,
                            "mutation moved to dead-letter store"
                        );
                        failed.push(FailedUpdate::new(update, reason));
                    } else {
                        warn!(
                            update_id = %update.id,
                            collection = %update.collection,
                            retry_count = update.retry_count,
                            error = %err,
                            "mutation failed, will retry"
                        );
                        retained.push(update);
                    }
                }
            }
        }

        outcome.dead_lettered = failed.len();
        self.dead_letters.append_all(failed).await?;
        let remaining = self.queue.commit_pass(&snapshot_ids, retained).await?;

        info!(
            succeeded = outcome.succeeded,
            failed = outcome.failed,
            dead_lettered = outcome.dead_lettered,
            remaining,
            "sync pass finished"
        );
        Ok(outcome)
    }

    async fn apply(&self, update: &PendingUpdate) -> Result<(), BackendError> {
        let timeout = self.config.backend_timeout;
        match tokio::time::timeout(timeout, apply_update(self.backend.as_ref(), update)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::timeout(timeout)),
        }
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.config)
            .field("syncing", &self.is_syncing())
            .finish_non_exhaustive()
    }
}
