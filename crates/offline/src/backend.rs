//! Remote backend boundary.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{MutationAction, Payload, PendingUpdate};

/// A record as returned by the backend.
pub type Record = serde_json::Value;

/// Whether retrying the same call can succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorKind {
    /// Network failure, timeout, overload. Worth retrying.
    Transient,
    /// Validation or other client error. Retrying will fail the same way.
    Permanent,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?} backend error: {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::Permanent,
            message: message.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::transient(format!("backend call timed out after {after:?}"))
    }

    /// Classify a non-success HTTP status.
    ///
    /// Timeouts, throttling, server errors and auth failures (a token refresh may fix them)
    /// are transient; every other client error is permanent.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = if body.trim().is_empty() {
            format!("HTTP {status}")
        } else {
            format!("HTTP {status}: {}", body.trim())
        };
        match status {
            401 | 403 | 408 | 425 | 429 | 500..=599 => Self::transient(message),
            _ => Self::permanent(message),
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.kind == BackendErrorKind::Permanent
    }
}

/// Per-collection CRUD API of the remote backend. Each call is atomic on the remote side.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    async fn insert(&self, collection: &str, record: &Payload) -> Result<Record, BackendError>;

    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        patch: &Payload,
    ) -> Result<Record, BackendError>;

    async fn delete_by_id(&self, collection: &str, id: &str) -> Result<(), BackendError>;
}

/// Dispatch a queued mutation to the matching backend call.
pub async fn apply_update(
    backend: &dyn RemoteBackend,
    update: &PendingUpdate,
) -> Result<(), BackendError> {
    let record_id = || {
        update
            .record_id
            .as_deref()
            .ok_or_else(|| BackendError::permanent(format!("{} without record id", update.action)))
    };

    match update.action {
        MutationAction::Insert => backend
            .insert(&update.collection, &update.payload)
            .await
            .map(|_| ()),
        MutationAction::Update => backend
            .update_by_id(&update.collection, record_id()?, &update.payload)
            .await
            .map(|_| ()),
        MutationAction::Delete => backend.delete_by_id(&update.collection, record_id()?).await,
    }
}

/// One call observed by [`InMemoryBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct BackendCall {
    pub action: MutationAction,
    pub collection: String,
    pub record_id: Option<String>,
    pub payload: Payload,
}

#[derive(Debug)]
struct FailureRule {
    record_id: Option<String>,
    remaining: u32,
    kind: BackendErrorKind,
}

#[derive(Debug, Default)]
struct BackendState {
    collections: HashMap<String, HashMap<String, Payload>>,
    calls: Vec<BackendCall>,
    failures: VecDeque<FailureRule>,
}

/// In-memory backend for tests/dev.
///
/// Records every call, and can be told to fail the next calls or to delay each call.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<BackendState>,
    latency: Mutex<Option<Duration>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record directly, bypassing call recording.
    pub fn seed(&self, collection: &str, id: &str, record: Payload) {
        self.with_state(|s| {
            s.collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.to_string(), record);
        });
    }

    pub fn record(&self, collection: &str, id: &str) -> Option<Payload> {
        self.with_state(|s| {
            s.collections
                .get(collection)
                .and_then(|c| c.get(id))
                .cloned()
        })
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.with_state(|s| s.calls.clone())
    }

    /// Fail the next `count` calls, or only those targeting `record_id` when given.
    pub fn fail_next(&self, record_id: Option<&str>, count: u32, kind: BackendErrorKind) {
        self.with_state(|s| {
            s.failures.push_back(FailureRule {
                record_id: record_id.map(str::to_string),
                remaining: count,
                kind,
            });
        });
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        match self.latency.lock() {
            Ok(mut guard) => *guard = latency,
            Err(poisoned) => *poisoned.into_inner() = latency,
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut BackendState) -> R) -> R {
        match self.state.lock() {
            Ok(mut guard) => f(&mut *guard),
            Err(poisoned) => f(&mut *poisoned.into_inner()),
        }
    }

    async fn delay(&self) {
        let latency = match self.latency.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Record the call and consume a matching failure rule, if any.
    fn begin(&self, call: BackendCall) -> Result<(), BackendError> {
        self.with_state(|s| {
            let target = call.record_id.clone();
            s.calls.push(call);

            let position = s.failures.iter().position(|rule| {
                rule.remaining > 0
                    && rule
                        .record_id
                        .as_ref()
                        .is_none_or(|id| target.as_ref() == Some(id))
            })?;
            let rule = &mut s.failures[position];
            rule.remaining -= 1;
            let kind = rule.kind;
            if rule.remaining == 0 {
                s.failures.remove(position);
            }
            Some(kind)
        })
        .map_or(Ok(()), |kind| {
            Err(BackendError {
                kind,
                message: "injected failure".to_string(),
            })
        })
    }
}

#[async_trait]
impl RemoteBackend for InMemoryBackend {
    async fn insert(&self, collection: &str, record: &Payload) -> Result<Record, BackendError> {
        self.delay().await;
        self.begin(BackendCall {
            action: MutationAction::Insert,
            collection: collection.to_string(),
            record_id: None,
            payload: record.clone(),
        })?;

        let mut stored = record.clone();
        let existing = stored.get("id").and_then(|v| v.as_str()).map(str::to_string);
        let id = match existing {
            Some(id) => id,
            None => {
                let id = Uuid::now_v7().to_string();
                stored.insert("id".to_string(), Record::String(id.clone()));
                id
            }
        };

        self.with_state(|s| {
            s.collections
                .entry(collection.to_string())
                .or_default()
                .insert(id, stored.clone());
        });
        Ok(Record::Object(stored))
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        patch: &Payload,
    ) -> Result<Record, BackendError> {
        self.delay().await;
        self.begin(BackendCall {
            action: MutationAction::Update,
            collection: collection.to_string(),
            record_id: Some(id.to_string()),
            payload: patch.clone(),
        })?;

        self.with_state(|s| {
            let record = s
                .collections
                .get_mut(collection)
                .and_then(|c| c.get_mut(id))
                .ok_or_else(|| BackendError::permanent(format!("{collection}/{id} not found")))?;
            for (field, value) in patch {
                record.insert(field.clone(), value.clone());
            }
            Ok(Record::Object(record.clone()))
        })
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> Result<(), BackendError> {
        self.delay().await;
        self.begin(BackendCall {
            action: MutationAction::Delete,
            collection: collection.to_string(),
            record_id: Some(id.to_string()),
            payload: Payload::new(),
        })?;

        self.with_state(|s| {
            if let Some(c) = s.collections.get_mut(collection) {
                c.remove(id);
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn status_classification() {
        for status in [401, 403, 408, 425, 429, 500, 502, 503, 504] {
            assert!(!BackendError::from_status(status, "").is_permanent(), "{status}");
        }
        for status in [400, 404, 409, 410, 413, 422] {
            assert!(BackendError::from_status(status, "").is_permanent(), "{status}");
        }
        assert_eq!(
            BackendError::from_status(422, " bad field ").message,
            "HTTP 422: bad field"
        );
    }

    #[tokio::test]
    async fn apply_update_dispatches_on_action() {
        let backend = InMemoryBackend::new();
        backend.seed("tickets", "t1", payload(json!({"status": "open"})));

        let update =
            PendingUpdate::update("tickets", "t1", payload(json!({"status": "completed"}))).unwrap();
        apply_update(&backend, &update).await.unwrap();
        assert_eq!(
            backend.record("tickets", "t1").unwrap()["status"],
            "completed"
        );

        let delete = PendingUpdate::delete("tickets", "t1").unwrap();
        apply_update(&backend, &delete).await.unwrap();
        assert!(backend.record("tickets", "t1").is_none());

        let insert = PendingUpdate::insert("customers", payload(json!({"name": "Ada"}))).unwrap();
        apply_update(&backend, &insert).await.unwrap();

        let actions: Vec<_> = backend.calls().iter().map(|c| c.action).collect();
        assert_eq!(
            actions,
            vec![
                MutationAction::Update,
                MutationAction::Delete,
                MutationAction::Insert
            ]
        );
    }

    #[tokio::test]
    async fn updating_a_missing_record_is_permanent() {
        let backend = InMemoryBackend::new();
        let err = backend
            .update_by_id("tickets", "nope", &Payload::new())
            .await
            .unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn injected_failures_target_a_record() {
        let backend = InMemoryBackend::new();
        backend.fail_next(Some("b"), 1, BackendErrorKind::Transient);

        assert!(backend.delete_by_id("tickets", "a").await.is_ok());
        let err = backend.delete_by_id("tickets", "b").await.unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::Transient);
        assert!(backend.delete_by_id("tickets", "b").await.is_ok());
        assert_eq!(backend.calls().len(), 3);
    }
}
