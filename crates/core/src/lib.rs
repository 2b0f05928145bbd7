//! `fieldops-core`: domain building blocks shared by the FieldOps crates.
//!
//! This crate contains **pure domain** primitives (no storage, network or runtime concerns).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{SyncRunId, UpdateId};
