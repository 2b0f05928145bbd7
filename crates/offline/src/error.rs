//! Error types for the offline queue.

use thiserror::Error;

use fieldops_core::DomainError;

/// Durable storage failure. Aborts the current sync pass without touching the queue.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key-value backend refused or failed the operation.
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be decoded.
    #[error("corrupt record under `{key}`: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode record: {0}")]
    Encode(#[source] serde_json::Error),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn corrupt(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Corrupt {
            key: key.into(),
            source,
        }
    }
}

/// Error surfaced by `sync()`. Individual mutation failures never show up here.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Error returned by the UI-facing queue surface.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
