//! Infrastructure adapters for the offline queue: SQLite storage, HTTP backend, config.

pub mod config;
pub mod http;
pub mod probe;
pub mod sqlite;

pub use config::{ConfigError, FieldOpsConfig};
pub use http::HttpBackend;
pub use probe::HttpReachabilityProbe;
pub use sqlite::SqliteKvStore;
