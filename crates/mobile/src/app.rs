//! Process-wide application state.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use fieldops_infra::{FieldOpsConfig, HttpBackend, HttpReachabilityProbe, SqliteKvStore};
use fieldops_offline::{
    AppLifecycle, ConnectivityProbe, InMemoryKvStore, NetworkMonitor, NetworkSignals,
    OfflineQueue, ProbeHandle, Reachability, RemoteBackend, SchedulerHandle, SharedKvStore,
    SyncConfig,
};

/// Application state shared across UI commands.
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<OfflineQueue>,
    pub network: Arc<NetworkMonitor>,
    pub lifecycle: Arc<AppLifecycle>,
}

impl AppState {
    /// Open the SQLite queue at `config.db_path` and talk to the configured REST backend.
    pub async fn connect(config: &FieldOpsConfig) -> anyhow::Result<Self> {
        let kv = SqliteKvStore::connect(&config.db_path)
            .await
            .with_context(|| format!("failed to open offline store at {:?}", config.db_path))?;

        let backend = match &config.auth_token {
            Some(token) => {
                tracing::info!("initializing backend with authentication token");
                HttpBackend::with_token(config.api_url.clone(), token.clone())
            }
            None => {
                tracing::info!("initializing backend without authentication token");
                HttpBackend::new(config.api_url.clone())
            }
        };

        Ok(Self::assemble(
            Arc::new(kv),
            Arc::new(backend),
            config.sync.clone(),
        ))
    }

    /// Volatile state over the given backend, for tests and demos.
    pub fn in_memory(backend: Arc<dyn RemoteBackend>, sync: SyncConfig) -> Self {
        Self::assemble(Arc::new(InMemoryKvStore::new()), backend, sync)
    }

    /// Wire the queue together. Until the platform reports otherwise the device is assumed to
    /// have an interface with unknown reachability, which classifies as online.
    pub fn assemble(kv: SharedKvStore, backend: Arc<dyn RemoteBackend>, sync: SyncConfig) -> Self {
        let network = Arc::new(NetworkMonitor::new(NetworkSignals {
            has_interface: true,
            reachable: Reachability::Unknown,
        }));
        let queue = Arc::new(OfflineQueue::new(kv, backend, network.clone(), sync));

        Self {
            queue,
            network,
            lifecycle: Arc::new(AppLifecycle::default()),
        }
    }

    /// Start the trigger scheduler and, if given, a reachability probe.
    pub fn start_background(
        &self,
        probe: Option<(Arc<dyn ConnectivityProbe>, Duration)>,
    ) -> BackgroundTasks {
        let scheduler = self.queue.start_scheduler(self.lifecycle.clone());
        let probe = probe.map(|(probe, interval)| self.network.clone().spawn_probe(probe, interval));
        tracing::info!(probe = probe.is_some(), "background sync started");

        BackgroundTasks { scheduler, probe }
    }

    /// Start background tasks with an HTTP health probe against the configured API.
    pub fn start_with_config(&self, config: &FieldOpsConfig) -> BackgroundTasks {
        let probe: Arc<dyn ConnectivityProbe> = Arc::new(HttpReachabilityProbe::new(&config.api_url));
        self.start_background(Some((probe, config.probe_interval)))
    }
}

/// Handles to the tasks started by [`AppState::start_background`].
#[derive(Debug)]
pub struct BackgroundTasks {
    scheduler: SchedulerHandle,
    probe: Option<ProbeHandle>,
}

impl BackgroundTasks {
    pub async fn shutdown(self) {
        if let Some(probe) = self.probe {
            probe.shutdown().await;
        }
        self.scheduler.shutdown().await;
        tracing::info!("background sync stopped");
    }
}
