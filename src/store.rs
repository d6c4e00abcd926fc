//! Blob store and dataset sinks the run writes its evidence to.

use crate::error::StoreError;
use crate::results::RunOutput;
use crate::utils::sanitize_key;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;

/// Key the run document is stored under.
pub const OUTPUT_KEY: &str = "OUTPUT";

/// Reference to a stored blob.
pub type BlobRef = String;

/// Key/value storage for screenshots and the output document.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under the sanitized form of `key` and returns a reference to it.
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<BlobRef, StoreError>;

    /// Identifier of the store, if it has one.
    fn store_id(&self) -> Option<&str>;
}

/// Append-only sink for run documents.
#[async_trait]
pub trait Dataset: Send + Sync {
    async fn append(&self, document: &RunOutput) -> Result<(), StoreError>;
}

/// Blob store writing one file per key under a directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    id: Option<String>,
}

impl FsBlobStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let id = root.file_name().map(|n| n.to_string_lossy().into_owned());
        Self { root, id }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<BlobRef, StoreError> {
        let safe_key = sanitize_key(key);
        let path = self.root.join(&safe_key);
        let io_err = |source: std::io::Error| StoreError::Io {
            key: safe_key.clone(),
            source,
        };

        tokio::fs::create_dir_all(&self.root).await.map_err(io_err)?;
        tokio::fs::write(&path, bytes).await.map_err(io_err)?;
        ::log::debug!("Stored {} ({} bytes, {})", path.display(), bytes.len(), content_type);

        Ok(path.to_string_lossy().into_owned())
    }

    fn store_id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// A blob kept in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// In-memory blob store; writes are kept in order.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    id: Option<String>,
    blobs: Mutex<Vec<StoredBlob>>,
}

impl MemoryBlobStore {
    pub fn new(id: Option<&str>) -> Self {
        Self {
            id: id.map(str::to_string),
            blobs: Mutex::new(Vec::new()),
        }
    }

    /// All writes so far, oldest first
    pub fn blobs(&self) -> Vec<StoredBlob> {
        self.blobs.lock().map(|b| b.clone()).unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<StoredBlob> {
        self.blobs().into_iter().rev().find(|b| b.key == key)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<BlobRef, StoreError> {
        let safe_key = sanitize_key(key);
        self.blobs
            .lock()
            .map_err(|_| StoreError::Poisoned { key: safe_key.clone() })?
            .push(StoredBlob {
                key: safe_key.clone(),
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            });
        Ok(match &self.id {
            Some(id) => format!("memory://{id}/{safe_key}"),
            None => format!("memory:{safe_key}"),
        })
    }

    fn store_id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// Dataset appending one JSON document per line to a file.
#[derive(Debug, Clone)]
pub struct JsonlDataset {
    path: PathBuf,
}

impl JsonlDataset {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Dataset for JsonlDataset {
    async fn append(&self, document: &RunOutput) -> Result<(), StoreError> {
        let key = self.path.display().to_string();
        let io_err = |source: std::io::Error| StoreError::Io {
            key: key.clone(),
            source,
        };

        let mut line = serde_json::to_vec(document)?;
        line.push(b'\n');

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(io_err)?;
        file.write_all(&line).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;
        Ok(())
    }
}

/// In-memory dataset.
#[derive(Debug, Default)]
pub struct MemoryDataset {
    documents: Mutex<Vec<RunOutput>>,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn documents(&self) -> Vec<RunOutput> {
        self.documents.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Dataset for MemoryDataset {
    async fn append(&self, document: &RunOutput) -> Result<(), StoreError> {
        self.documents
            .lock()
            .map_err(|_| StoreError::Poisoned {
                key: format!("dataset/{}", document.hotel_id),
            })?
            .push(document.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_sanitizes_keys() {
        let store = MemoryBlobStore::new(Some("kvs"));
        let reference = store.put("shots/home 1.png", &[1, 2, 3], "image/png").await.unwrap();
        assert_eq!(reference, "memory://kvs/shots_home_1.png");
        let blob = store.get("shots_home_1.png").unwrap();
        assert_eq!(blob.bytes, vec![1, 2, 3]);
        assert_eq!(blob.content_type, "image/png");
    }

    #[tokio::test]
    async fn test_memory_store_reports_poisoned_lock() {
        let store = MemoryBlobStore::new(Some("kvs"));
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = store.blobs.lock().unwrap();
            panic!("writer died");
        }));

        let err = store.put("home.png", &[1], "image/png").await.unwrap_err();
        assert!(matches!(err, StoreError::Poisoned { ref key } if key == "home.png"));
        assert_eq!(err.to_string(), "store lock poisoned while writing home.png");
    }

    #[tokio::test]
    async fn test_fs_store_writes_file() {
        let dir = std::env::temp_dir().join(format!("hotel-snapshot-store-{}", std::process::id()));
        let store = FsBlobStore::new(&dir);
        let reference = store.put("a/b.txt", b"hello", "text/plain").await.unwrap();
        assert!(reference.ends_with("a_b.txt"));
        assert_eq!(std::fs::read(dir.join("a_b.txt")).unwrap(), b"hello");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
