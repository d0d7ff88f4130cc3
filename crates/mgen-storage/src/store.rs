//! Blob store port, key convention, and in-memory implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{StorageError, StorageResult};

/// Upload port for durable media storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload `bytes` under `key`, returning the durable public URL.
    async fn upload(
        &self,
        bytes: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<String>;
}

/// Build the canonical media key: `media/{YYYYMMDD}/{taskId}/{filename}`.
pub fn media_key(date: DateTime<Utc>, task_id: &str, filename: &str) -> StorageResult<String> {
    if task_id.is_empty() || filename.is_empty() {
        return Err(StorageError::invalid_key(
            "task id and filename must be non-empty",
        ));
    }
    if filename.contains('/') {
        return Err(StorageError::invalid_key(format!(
            "filename must not contain '/': {filename}"
        )));
    }
    Ok(format!(
        "media/{}/{}/{}",
        date.format("%Y%m%d"),
        task_id,
        filename
    ))
}

/// In-memory blob store for tests and local runs.
///
/// URLs use a `memory://` scheme so accidental production use is obvious.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored bytes for `key`, if any.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .expect("lock poisoned")
            .get(key)
            .map(|(bytes, _)| bytes.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<String> {
        if key.is_empty() {
            return Err(StorageError::invalid_key("empty key"));
        }
        self.objects
            .lock()
            .expect("lock poisoned")
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(format!("memory://{key}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_media_key_convention() {
        let date = Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap();
        let key = media_key(date, "task-1", "final.mp4").unwrap();
        assert_eq!(key, "media/20260806/task-1/final.mp4");
    }

    #[test]
    fn test_media_key_rejects_path_separators() {
        let date = Utc::now();
        assert!(media_key(date, "task-1", "../escape.mp4").is_err());
        assert!(media_key(date, "", "a.mp4").is_err());
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryBlobStore::new();
        let url = store
            .upload(b"bytes".to_vec(), "media/20260806/t/a.png", "image/png")
            .await
            .unwrap();

        assert_eq!(url, "memory://media/20260806/t/a.png");
        assert_eq!(store.get("media/20260806/t/a.png").unwrap(), b"bytes");
    }
}
