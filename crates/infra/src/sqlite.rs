//! SQLite-backed key-value store.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use fieldops_offline::{KeyValueStore, StoreError};

fn store_err(err: sqlx::Error) -> StoreError {
    StoreError::backend(err.to_string())
}

/// Key-value store over a single SQLite table.
///
/// Each `set` is one upsert statement, which SQLite applies atomically.
#[derive(Debug, Clone)]
pub struct SqliteKvStore {
    pool: SqlitePool,
}

impl SqliteKvStore {
    /// Open (creating if missing) the database file at `path`.
    pub async fn connect(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(store_err)?;

        tracing::debug!(path = %path.display(), "opened sqlite store");
        Self::with_pool(pool).await
    }

    /// Private in-memory database for tests.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(store_err)?;
        // One connection that is never recycled: the database lives as long as it does.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(store_err)?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key        TEXT PRIMARY KEY,
                value      BLOB NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(store_err)?;

        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl KeyValueStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        row.map(|r| r.try_get::<Vec<u8>, _>("value"))
            .transpose()
            .map_err(store_err)
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use fieldops_offline::{
        InMemoryBackend, NetworkMonitor, OfflineQueue, PendingUpdate, SyncConfig,
    };

    #[tokio::test]
    async fn set_overwrites_and_remove_is_idempotent() {
        let store = SqliteKvStore::in_memory().await.unwrap();

        store.set("offline_queue", b"[]").await.unwrap();
        store.set("offline_queue", b"[1]").await.unwrap();
        assert_eq!(
            store.get("offline_queue").await.unwrap().as_deref(),
            Some(&b"[1]"[..])
        );

        store.remove("offline_queue").await.unwrap();
        store.remove("offline_queue").await.unwrap();
        assert!(store.get("offline_queue").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn queue_survives_reopening_the_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("offline.db");

        let open = |kv: SqliteKvStore| {
            OfflineQueue::new(
                Arc::new(kv),
                Arc::new(InMemoryBackend::new()),
                Arc::new(NetworkMonitor::offline()),
                SyncConfig::default(),
            )
        };

        let store = SqliteKvStore::connect(&path).await.unwrap();
        let queue = open(store.clone());
        for id in ["t1", "t2", "t3"] {
            queue
                .enqueue(PendingUpdate::delete("tickets", id).unwrap())
                .await
                .unwrap();
        }
        let before = queue.pending().await.unwrap();
        drop(queue);
        store.close().await;

        let reopened = open(SqliteKvStore::connect(&path).await.unwrap());
        assert_eq!(reopened.pending().await.unwrap(), before);
    }
}
