//! File-backed key-value store.
//!
//! Each key maps to `<root>/<key>.json`. Writes go to a uniquely named temp file in the same
//! directory, are fsynced, then renamed over the target, so a reader or a crash never observes
//! a partially written value.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use super::KeyValueStore;
use crate::error::StoreError;

/// Durable key-value store writing one file per key.
#[derive(Debug, Clone)]
pub struct FileKvStore {
    root: PathBuf,
}

impl FileKvStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::backend(format!("invalid storage key `{key}`")));
        }
        Ok(self.root.join(format!("{key}.json")))
    }

    async fn sync_dir(&self) {
        // Persist the rename itself. Not every platform allows opening a directory.
        if let Ok(dir) = tokio::fs::File::open(&self.root).await {
            if let Err(err) = dir.sync_all().await {
                debug!(root = ?self.root, error = %err, "directory sync failed");
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let tmp = self.root.join(format!(".{key}.{}.tmp", Uuid::now_v7()));

        let write = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(value).await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp, &path).await
        };

        if let Err(e) = write.await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        self.sync_dir().await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                self.sync_dir().await;
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::QUEUE_KEY;

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let store = FileKvStore::open(dir.path()).await.unwrap();
        store.set(QUEUE_KEY, b"[1,2,3]").await.unwrap();
        drop(store);

        let reopened = FileKvStore::open(dir.path()).await.unwrap();
        assert_eq!(
            reopened.get(QUEUE_KEY).await.unwrap().as_deref(),
            Some(&b"[1,2,3]"[..])
        );
    }

    #[tokio::test]
    async fn overwrite_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::open(dir.path()).await.unwrap();

        for i in 0..5 {
            store.set(QUEUE_KEY, format!("[{i}]").as_bytes()).await.unwrap();
        }

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("{QUEUE_KEY}.json")]);
    }

    #[tokio::test]
    async fn remove_missing_key_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::open(dir.path()).await.unwrap();

        store.remove(QUEUE_KEY).await.unwrap();
        assert!(store.get(QUEUE_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn path_like_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKvStore::open(dir.path()).await.unwrap();

        assert!(store.set("../escape", b"x").await.is_err());
        assert!(store.get("a/b").await.is_err());
    }
}
