//! App lifecycle state as reported by the host.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Active,
    Inactive,
    Background,
}

impl std::str::FromStr for LifecycleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(LifecycleState::Active),
            "inactive" => Ok(LifecycleState::Inactive),
            "background" => Ok(LifecycleState::Background),
            other => Err(format!("unknown app state `{other}`")),
        }
    }
}

/// Host-driven lifecycle observer.
#[derive(Debug)]
pub struct AppLifecycle {
    tx: watch::Sender<LifecycleState>,
}

impl Default for AppLifecycle {
    fn default() -> Self {
        Self::new(LifecycleState::Active)
    }
}

impl AppLifecycle {
    pub fn new(initial: LifecycleState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Record a new state. Returns `true` when this is a transition into `Active`.
    pub fn set_state(&self, state: LifecycleState) -> bool {
        let mut entered_foreground = false;
        self.tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            entered_foreground = state == LifecycleState::Active;
            *current = state;
            true
        });
        if entered_foreground {
            tracing::debug!("app entered foreground");
        }
        entered_foreground
    }

    pub fn current(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }
}
