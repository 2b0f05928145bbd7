//! UI bridge commands.
//!
//! Arguments arrive as strings/JSON from the UI layer and errors go back as strings.

use fieldops_core::UpdateId;
use fieldops_offline::{
    Connectivity, FailedUpdate, LifecycleState, MutationAction, NetworkSignals, Payload,
    PendingUpdate, QueueStatus, Reachability, SyncOutcome,
};
use serde_json::Value;

use crate::app::AppState;

fn parse_id(id: &str) -> Result<UpdateId, String> {
    id.parse::<UpdateId>()
        .map_err(|e| format!("Invalid update id: {}", e))
}

/// Record a mutation in the offline queue. Returns the new update id.
pub async fn enqueue_update(
    state: &AppState,
    collection: String,
    action: String,
    record_id: Option<String>,
    payload: Value,
) -> Result<String, String> {
    let action = action
        .parse::<MutationAction>()
        .map_err(|e| format!("Invalid action: {}", e))?;

    let payload = match payload {
        Value::Object(map) => map,
        Value::Null => Payload::new(),
        _ => return Err("Invalid payload: expected a JSON object".to_string()),
    };

    let update = PendingUpdate::new(collection, action, payload, record_id)
        .map_err(|e| e.to_string())?;

    let id = state
        .queue
        .enqueue(update)
        .await
        .map_err(|e| format!("Failed to enqueue update: {}", e))?;
    Ok(id.to_string())
}

/// Sync now (pull-to-refresh).
pub async fn sync_now(state: &AppState) -> Result<SyncOutcome, String> {
    state
        .queue
        .sync()
        .await
        .map_err(|e| format!("Sync failed: {}", e))
}

pub async fn get_queue_status(state: &AppState) -> Result<QueueStatus, String> {
    state.queue.status().await.map_err(|e| e.to_string())
}

pub async fn list_pending_updates(state: &AppState) -> Result<Vec<PendingUpdate>, String> {
    state.queue.pending().await.map_err(|e| e.to_string())
}

pub async fn list_failed_updates(state: &AppState) -> Result<Vec<FailedUpdate>, String> {
    state.queue.list_failed().await.map_err(|e| e.to_string())
}

/// Move a dead-lettered update back into the queue.
pub async fn requeue_failed_update(state: &AppState, id: String) -> Result<bool, String> {
    let id = parse_id(&id)?;
    state.queue.requeue(id).await.map_err(|e| e.to_string())
}

pub async fn discard_failed_update(state: &AppState, id: String) -> Result<bool, String> {
    let id = parse_id(&id)?;
    state.queue.discard_failed(id).await.map_err(|e| e.to_string())
}

/// Drop all pending updates.
pub async fn clear_queue(state: &AppState) -> Result<(), String> {
    state.queue.clear().await.map_err(|e| e.to_string())
}

/// Platform network callback. `reachable` is `None` when reachability is unknown.
pub fn set_network_signals(
    state: &AppState,
    has_interface: bool,
    reachable: Option<bool>,
) -> Connectivity {
    state.network.update(NetworkSignals {
        has_interface,
        reachable: Reachability::from(reachable),
    });
    state.network.current()
}

pub fn get_connectivity_state(state: &AppState) -> Connectivity {
    state.network.current()
}

/// Platform lifecycle callback (`active`, `inactive`, `background`).
pub fn set_app_state(state: &AppState, app_state: String) -> Result<(), String> {
    let next = app_state.parse::<LifecycleState>()?;
    state.lifecycle.set_state(next);
    Ok(())
}
