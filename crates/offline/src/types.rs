//! Queue record types and sync outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fieldops_core::{DomainError, DomainResult, UpdateId};

/// Field name to value mapping carried by a mutation.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Kind of write a queued mutation performs against its remote collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationAction {
    /// Create a record; payload is the full record.
    Insert,
    /// Patch an existing record; payload holds only the changed fields.
    Update,
    /// Delete an existing record; payload is ignored.
    Delete,
}

impl MutationAction {
    /// Whether the action targets an existing remote record.
    pub fn requires_record_id(self) -> bool {
        matches!(self, MutationAction::Update | MutationAction::Delete)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MutationAction::Insert => "insert",
            MutationAction::Update => "update",
            MutationAction::Delete => "delete",
        }
    }
}

impl core::fmt::Display for MutationAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for MutationAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "insert" => Ok(MutationAction::Insert),
            "update" => Ok(MutationAction::Update),
            "delete" => Ok(MutationAction::Delete),
            other => Err(DomainError::validation(format!("unknown action `{other}`"))),
        }
    }
}

/// A single write recorded on the device, waiting to be applied to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpdate {
    pub id: UpdateId,
    pub collection: String,
    pub action: MutationAction,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl PendingUpdate {
    /// Create a new mutation, checking that `record_id` is present exactly when the action
    /// targets an existing record.
    pub fn new(
        collection: impl Into<String>,
        action: MutationAction,
        payload: Payload,
        record_id: Option<String>,
    ) -> DomainResult<Self> {
        let update = Self {
            id: UpdateId::new(),
            collection: collection.into(),
            action,
            payload,
            record_id,
            enqueued_at: Utc::now(),
            retry_count: 0,
            last_error: None,
        };
        update.validate()?;
        Ok(update)
    }

    pub fn insert(collection: impl Into<String>, record: Payload) -> DomainResult<Self> {
        Self::new(collection, MutationAction::Insert, record, None)
    }

    pub fn update(
        collection: impl Into<String>,
        record_id: impl Into<String>,
        patch: Payload,
    ) -> DomainResult<Self> {
        Self::new(collection, MutationAction::Update, patch, Some(record_id.into()))
    }

    pub fn delete(collection: impl Into<String>, record_id: impl Into<String>) -> DomainResult<Self> {
        Self::new(
            collection,
            MutationAction::Delete,
            Payload::new(),
            Some(record_id.into()),
        )
    }

    /// Check the structural invariants of the record.
    pub fn validate(&self) -> DomainResult<()> {
        if self.collection.trim().is_empty() {
            return Err(DomainError::validation("collection must not be empty"));
        }

        match (&self.record_id, self.action.requires_record_id()) {
            (None, true) => Err(DomainError::validation(format!(
                "{} on `{}` requires a record id",
                self.action, self.collection
            ))),
            (Some(_), false) => Err(DomainError::validation(format!(
                "{} on `{}` must not carry a record id",
                self.action, self.collection
            ))),
            (Some(id), true) if id.trim().is_empty() => Err(DomainError::validation(format!(
                "{} on `{}` has an empty record id",
                self.action, self.collection
            ))),
            _ => Ok(()),
        }
    }

    /// Record a failed attempt.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_error = Some(error.into());
    }

    /// Give the mutation a new identity as if it had just been created.
    pub fn renew(&mut self) {
        self.id = UpdateId::new();
        self.enqueued_at = Utc::now();
        self.reset_retries();
    }

    /// Reset retry bookkeeping before the item re-enters the active queue.
    pub fn reset_retries(&mut self) {
        self.retry_count = 0;
        self.last_error = None;
    }
}

/// Why a mutation was moved out of the active queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadLetterReason {
    /// Failed `max_retries` times.
    RetriesExhausted,
    /// The backend rejected it in a way retrying cannot fix.
    Permanent,
}

/// A mutation held for manual inspection after it left the active queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedUpdate {
    #[serde(flatten)]
    pub update: PendingUpdate,
    pub failed_at: DateTime<Utc>,
    pub reason: DeadLetterReason,
}

impl FailedUpdate {
    pub fn new(update: PendingUpdate, reason: DeadLetterReason) -> Self {
        Self {
            update,
            failed_at: Utc::now(),
            reason,
        }
    }

    pub fn id(&self) -> UpdateId {
        self.update.id
    }
}

/// Snapshot of queue and sync state for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub pending: usize,
    pub syncing: bool,
    pub last_sync_attempt: Option<DateTime<Utc>>,
    pub last_successful_sync: Option<DateTime<Utc>>,
    pub dead_lettered: usize,
}

/// Why `sync()` returned without running a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncSkipReason {
    Offline,
    AlreadyRunning,
}

/// Result of one `sync()` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    /// Mutations applied to the backend and removed from the queue.
    pub succeeded: usize,
    /// Mutations whose attempt failed this pass (retained or dead-lettered).
    pub failed: usize,
    /// Subset of `failed` that was moved to the dead-letter store.
    pub dead_lettered: usize,
    pub skipped: Option<SyncSkipReason>,
}

impl SyncOutcome {
    pub fn skipped(reason: SyncSkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }

    /// Whether a pass actually ran.
    pub fn ran(&self) -> bool {
        self.skipped.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patch(value: serde_json::Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn update_and_delete_require_record_id() {
        let err = PendingUpdate::new("tickets", MutationAction::Update, Payload::new(), None)
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = PendingUpdate::new("tickets", MutationAction::Delete, Payload::new(), None)
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = PendingUpdate::update("tickets", "  ", Payload::new()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn insert_must_not_carry_record_id() {
        let err = PendingUpdate::new(
            "tickets",
            MutationAction::Insert,
            Payload::new(),
            Some("t1".into()),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn empty_collection_is_rejected() {
        assert!(PendingUpdate::insert(" ", Payload::new()).is_err());
    }

    #[test]
    fn new_update_starts_without_retries() {
        let update =
            PendingUpdate::update("tickets", "t1", patch(json!({"status": "completed"}))).unwrap();

        assert_eq!(update.retry_count, 0);
        assert!(update.last_error.is_none());
        assert_eq!(update.record_id.as_deref(), Some("t1"));
    }

    #[test]
    fn failure_bookkeeping() {
        let mut update = PendingUpdate::delete("appointments", "a9").unwrap();

        update.record_failure("timeout");
        update.record_failure("503 service unavailable");
        assert_eq!(update.retry_count, 2);
        assert_eq!(update.last_error.as_deref(), Some("503 service unavailable"));

        update.reset_retries();
        assert_eq!(update.retry_count, 0);
        assert!(update.last_error.is_none());
    }

    #[test]
    fn renew_assigns_a_new_id_and_clears_retries() {
        let mut update = PendingUpdate::delete("appointments", "a9").unwrap();
        let original = update.id;
        update.record_failure("timeout");

        update.renew();
        assert_ne!(update.id, original);
        assert_eq!(update.retry_count, 0);
        assert!(update.last_error.is_none());
    }

    #[test]
    fn serialized_shape_uses_camel_case_and_flattens_failed_updates() {
        let update =
            PendingUpdate::update("tickets", "t1", patch(json!({"status": "completed"}))).unwrap();
        let failed = FailedUpdate::new(update, DeadLetterReason::RetriesExhausted);

        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value["collection"], "tickets");
        assert_eq!(value["action"], "update");
        assert_eq!(value["recordId"], "t1");
        assert_eq!(value["retryCount"], 0);
        assert_eq!(value["reason"], "retries_exhausted");
        assert!(value.get("failedAt").is_some());
        assert!(value.get("lastError").is_none());
    }

    #[test]
    fn actions_parse_case_insensitively() {
        assert_eq!("Update".parse::<MutationAction>().unwrap(), MutationAction::Update);
        assert!("upsert".parse::<MutationAction>().is_err());
    }

    #[test]
    fn skipped_outcome_has_zero_counts() {
        let outcome = SyncOutcome::skipped(SyncSkipReason::Offline);
        assert!(!outcome.ran());
        assert_eq!(outcome.succeeded, 0);
        assert_eq!(outcome.failed, 0);
    }
}
