//! `fieldops-mobile`
//!
//! **Responsibility:** host wiring for the technician client.
//!
//! This crate provides:
//! - [`AppState`]: the offline queue, network monitor and lifecycle built once per process
//! - string-typed [`commands`] for the UI bridge
//! - the headless `fieldops-agent` binary
//!
//! All sync logic lives in `fieldops-offline`; this crate only assembles it.

pub mod app;
pub mod commands;

pub use app::{AppState, BackgroundTasks};
