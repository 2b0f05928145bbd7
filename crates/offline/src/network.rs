//! Connectivity classification and transition events.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;

/// Online/offline classification used to gate sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub fn is_online(self) -> bool {
        self == Connectivity::Online
    }
}

/// Whether the backend host was found reachable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reachability {
    Reachable,
    Unreachable,
    #[default]
    Unknown,
}

impl From<Option<bool>> for Reachability {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Reachability::Reachable,
            Some(false) => Reachability::Unreachable,
            None => Reachability::Unknown,
        }
    }
}

/// Raw signals pushed by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSignals {
    pub has_interface: bool,
    #[serde(default)]
    pub reachable: Reachability,
}

impl NetworkSignals {
    pub fn online() -> Self {
        Self {
            has_interface: true,
            reachable: Reachability::Reachable,
        }
    }

    pub fn offline() -> Self {
        Self {
            has_interface: false,
            reachable: Reachability::Unknown,
        }
    }

    /// Online iff an interface is up and reachability is not known to be false.
    pub fn classify(&self) -> Connectivity {
        match (self.has_interface, self.reachable) {
            (true, Reachability::Reachable | Reachability::Unknown) => Connectivity::Online,
            _ => Connectivity::Offline,
        }
    }
}

/// Tracks network signals and publishes classification changes.
///
/// Subscribers only see a new value when the classification flips; repeated signals that
/// keep the same classification are absorbed.
#[derive(Debug)]
pub struct NetworkMonitor {
    signals: Mutex<NetworkSignals>,
    tx: watch::Sender<Connectivity>,
}

impl NetworkMonitor {
    pub fn new(initial: NetworkSignals) -> Self {
        let (tx, _rx) = watch::channel(initial.classify());
        Self {
            signals: Mutex::new(initial),
            tx,
        }
    }

    pub fn online() -> Self {
        Self::new(NetworkSignals::online())
    }

    pub fn offline() -> Self {
        Self::new(NetworkSignals::offline())
    }

    /// Replace both signals. Returns the new classification if it changed.
    pub fn update(&self, signals: NetworkSignals) -> Option<Connectivity> {
        self.modify(|s| *s = signals)
    }

    pub fn update_interface(&self, has_interface: bool) -> Option<Connectivity> {
        self.modify(|s| s.has_interface = has_interface)
    }

    pub fn update_reachability(&self, reachable: Reachability) -> Option<Connectivity> {
        self.modify(|s| s.reachable = reachable)
    }

    fn modify(&self, f: impl FnOnce(&mut NetworkSignals)) -> Option<Connectivity> {
        let mut signals = match self.signals.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut signals);
        let next = signals.classify();

        let changed = self.tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });

        if changed {
            tracing::info!(connectivity = ?next, "network connectivity changed");
            Some(next)
        } else {
            None
        }
    }

    pub fn current(&self) -> Connectivity {
        *self.tx.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.current().is_online()
    }

    /// Receiver woken on every classification change.
    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.tx.subscribe()
    }

    /// Poll `probe` every `interval` and feed its answer into the monitor.
    pub fn spawn_probe(
        self: Arc<Self>,
        probe: Arc<dyn ConnectivityProbe>,
        interval: Duration,
    ) -> ProbeHandle {
        let shutdown = Arc::new(Notify::new());
        let stop = shutdown.clone();

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = stop.notified() => break,
                    _ = ticker.tick() => {
                        let reachable = probe.reachability().await;
                        tracing::debug!(?reachable, "connectivity probe");
                        self.update_reachability(reachable);
                    }
                }
            }
            tracing::debug!("connectivity probe stopped");
        });

        ProbeHandle { shutdown, join }
    }
}

/// Active reachability check, e.g. an HTTP health endpoint.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn reachability(&self) -> Reachability;
}

/// Handle to a running probe loop.
#[derive(Debug)]
pub struct ProbeHandle {
    shutdown: Arc<Notify>,
    join: JoinHandle<()>,
}

impl ProbeHandle {
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        let _ = self.join.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn classification_gives_unknown_reachability_the_benefit_of_the_doubt() {
        let cases = [
            (true, Reachability::Reachable, Connectivity::Online),
            (true, Reachability::Unknown, Connectivity::Online),
            (true, Reachability::Unreachable, Connectivity::Offline),
            (false, Reachability::Reachable, Connectivity::Offline),
            (false, Reachability::Unknown, Connectivity::Offline),
        ];
        for (has_interface, reachable, expected) in cases {
            let signals = NetworkSignals {
                has_interface,
                reachable,
            };
            assert_eq!(signals.classify(), expected, "{signals:?}");
        }
    }

    #[test]
    fn transitions_are_edge_triggered() {
        let monitor = NetworkMonitor::offline();
        let mut rx = monitor.subscribe();

        assert_eq!(monitor.update_interface(false), None);
        assert!(!rx.has_changed().unwrap());

        assert_eq!(monitor.update_interface(true), Some(Connectivity::Online));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Connectivity::Online);

        // Still online: reachability confirmed.
        assert_eq!(monitor.update_reachability(Reachability::Reachable), None);
        assert!(!rx.has_changed().unwrap());

        assert_eq!(
            monitor.update_reachability(Reachability::Unreachable),
            Some(Connectivity::Offline)
        );
        assert!(!monitor.is_online());
    }

    struct FlakyProbe {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ConnectivityProbe for FlakyProbe {
        async fn reachability(&self) -> Reachability {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Reachability::Unreachable
            } else {
                Reachability::Reachable
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn probe_feeds_reachability() {
        let monitor = Arc::new(NetworkMonitor::online());
        let mut rx = monitor.subscribe();
        let probe = Arc::new(FlakyProbe {
            calls: AtomicUsize::new(0),
        });

        let handle = monitor
            .clone()
            .spawn_probe(probe.clone(), Duration::from_secs(5));

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Connectivity::Offline);

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Connectivity::Online);

        handle.shutdown().await;
        assert!(probe.calls.load(Ordering::SeqCst) >= 2);
    }
}
