//! Offline-first mutation queue and synchronization engine.
//!
//! Writes made while disconnected are persisted as [`PendingUpdate`]s and later applied to a
//! [`RemoteBackend`] by the [`SyncEngine`]. Failed mutations are retried up to
//! [`SyncConfig::max_retries`] times and then moved to the [`DeadLetterStore`]. The
//! [`TriggerScheduler`] runs passes on reconnect, foreground, enqueue and a periodic timer.
//!
//! [`OfflineQueue`] is the surface the UI talks to.

pub mod backend;
pub mod config;
pub mod dead_letter;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod network;
pub mod offline_queue;
pub mod queue_store;
pub mod scheduler;
pub mod status;
pub mod storage;
pub mod types;

pub use backend::{
    BackendCall, BackendError, BackendErrorKind, InMemoryBackend, Record, RemoteBackend,
    apply_update,
};
pub use config::SyncConfig;
pub use dead_letter::DeadLetterStore;
pub use engine::SyncEngine;
pub use error::{QueueError, StoreError, SyncError};
pub use lifecycle::{AppLifecycle, LifecycleState};
pub use network::{
    Connectivity, ConnectivityProbe, NetworkMonitor, NetworkSignals, ProbeHandle, Reachability,
};
pub use offline_queue::OfflineQueue;
pub use queue_store::QueueStore;
pub use scheduler::{SchedulerHandle, SyncTrigger, TriggerScheduler};
pub use status::{SyncMetadata, SyncMetadataStore};
pub use storage::{FileKvStore, InMemoryKvStore, KeyValueStore, SharedKvStore};
pub use types::{
    DeadLetterReason, FailedUpdate, MutationAction, Payload, PendingUpdate, QueueStatus,
    SyncOutcome, SyncSkipReason,
};
