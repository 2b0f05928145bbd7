//! Trigger scheduler: decides when to run a sync pass.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::engine::SyncEngine;
use crate::lifecycle::{AppLifecycle, LifecycleState};

/// What caused a sync attempt. Recorded on the pass span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    Enqueue,
    Reconnect,
    Periodic,
    Foreground,
    Manual,
}

/// Spawn a sync pass as an independent task. Errors are logged, never propagated.
pub fn fire(engine: &Arc<SyncEngine>, trigger: SyncTrigger) -> JoinHandle<()> {
    let engine = engine.clone();
    tokio::spawn(async move {
        match engine.sync_for(trigger).await {
            Ok(outcome) if outcome.ran() => tracing::debug!(
                ?trigger,
                succeeded = outcome.succeeded,
                failed = outcome.failed,
                "triggered sync finished"
            ),
            Ok(outcome) => {
                tracing::debug!(?trigger, skipped = ?outcome.skipped, "triggered sync skipped")
            }
            Err(err) => tracing::warn!(?trigger, error = %err, "triggered sync failed"),
        }
    })
}

/// Combines network, lifecycle, enqueue and timer signals into sync triggers.
pub struct TriggerScheduler {
    engine: Arc<SyncEngine>,
    lifecycle: Arc<AppLifecycle>,
    enqueued: Arc<Notify>,
    interval: Duration,
}

impl TriggerScheduler {
    pub fn new(engine: Arc<SyncEngine>, lifecycle: Arc<AppLifecycle>, enqueued: Arc<Notify>) -> Self {
        let interval = engine.config().sync_interval;
        Self {
            engine,
            lifecycle,
            enqueued,
            interval,
        }
    }

    /// Start the trigger loop.
    ///
    /// Subscriptions are taken before this returns, so signal changes made right after
    /// `spawn` are not missed.
    pub fn spawn(self) -> SchedulerHandle {
        let shutdown = Arc::new(Notify::new());
        let stop = shutdown.clone();

        let Self {
            engine,
            lifecycle,
            enqueued,
            interval,
        } = self;
        let network = engine.network().clone();
        let mut network_rx = network.subscribe();
        let mut lifecycle_rx = lifecycle.subscribe();

        let join = tokio::spawn(async move {
            // Keep the senders alive for as long as the loop runs.
            let _lifecycle = lifecycle;
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!(?interval, "sync scheduler started");

            loop {
                tokio::select! {
                    _ = stop.notified() => {
                        tracing::info!("sync scheduler received shutdown signal");
                        break;
                    }
                    changed = network_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        // The watch only wakes on a flip, so Online here means we came back.
                        let connectivity = *network_rx.borrow_and_update();
                        if connectivity.is_online() {
                            ticker.reset();
                            fire(&engine, SyncTrigger::Reconnect);
                        }
                    }
                    changed = lifecycle_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = *lifecycle_rx.borrow_and_update();
                        if state == LifecycleState::Active && network.is_online() {
                            fire(&engine, SyncTrigger::Foreground);
                        }
                    }
                    _ = enqueued.notified() => {
                        if network.is_online() {
                            fire(&engine, SyncTrigger::Enqueue);
                        }
                    }
                    _ = ticker.tick() => {
                        if network.is_online() {
                            fire(&engine, SyncTrigger::Periodic);
                        }
                    }
                }
            }

            tracing::info!("sync scheduler stopped");
        });

        SchedulerHandle { shutdown, join }
    }
}

/// Handle to a running scheduler loop.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: Arc<Notify>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the loop and wait for it to exit. Passes already spawned run to completion.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(err) = self.join.await {
            tracing::warn!(error = %err, "sync scheduler task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
