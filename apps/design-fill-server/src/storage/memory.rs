//! In-memory storage backend
//!
//! Keeps files in a map and stamps modification times from an injected
//! [`Clock`]. Used by tests in place of the disk.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{StorageWriter, StoredFile, UploadStorage};
use crate::clock::Clock;
use crate::error::StorageError;

#[derive(Debug, Clone)]
struct MemoryFile {
    data: Vec<u8>,
    modified: DateTime<Utc>,
}

#[derive(Default)]
struct MemoryInner {
    files: RwLock<BTreeMap<String, MemoryFile>>,
    /// Names whose deletion fails with `PermissionDenied`
    protected: RwLock<HashSet<String>>,
}

/// Map-backed [`UploadStorage`]
#[derive(Clone)]
pub struct MemoryStorage {
    inner: Arc<MemoryInner>,
    clock: Arc<dyn Clock>,
}

impl MemoryStorage {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(MemoryInner::default()),
            clock,
        }
    }

    /// Make deletes of `name` fail, as a read-only file would
    pub fn protect(&self, name: &str) {
        self.inner.protected.write().insert(name.to_string());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.files.read().contains_key(name)
    }

    /// All names, staging files included, in sorted order
    pub fn file_names(&self) -> Vec<String> {
        self.inner.files.read().keys().cloned().collect()
    }
}

#[async_trait::async_trait]
impl UploadStorage for MemoryStorage {
    async fn list_files(&self) -> Result<Vec<StoredFile>, StorageError> {
        let files = self.inner.files.read();
        Ok(files
            .iter()
            .map(|(name, file)| StoredFile {
                name: name.clone(),
                size: file.data.len() as u64,
                modified: file.modified,
            })
            .collect())
    }

    async fn metadata(&self, name: &str) -> Result<StoredFile, StorageError> {
        let files = self.inner.files.read();
        let file = files
            .get(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;
        Ok(StoredFile {
            name: name.to_string(),
            size: file.data.len() as u64,
            modified: file.modified,
        })
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        self.inner
            .files
            .read()
            .get(name)
            .map(|file| file.data.clone())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn write(&self, name: &str, data: &[u8]) -> Result<(), StorageError> {
        let file = MemoryFile {
            data: data.to_vec(),
            modified: self.clock.now(),
        };
        self.inner.files.write().insert(name.to_string(), file);
        Ok(())
    }

    async fn create(&self, name: &str) -> Result<Box<dyn StorageWriter>, StorageError> {
        self.write(name, &[]).await?;
        Ok(Box::new(MemoryWriter {
            storage: self.clone(),
            name: name.to_string(),
        }))
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let mut files = self.inner.files.write();
        let file = files
            .remove(from)
            .ok_or_else(|| StorageError::NotFound(from.to_string()))?;
        files.insert(to.to_string(), file);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        if self.inner.protected.read().contains(name) {
            return Err(StorageError::PermissionDenied(name.to_string()));
        }
        self.inner
            .files
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }
}

/// Appends straight into the map, so partial uploads are visible
struct MemoryWriter {
    storage: MemoryStorage,
    name: String,
}

#[async_trait::async_trait]
impl StorageWriter for MemoryWriter {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        let now = self.storage.clock.now();
        let mut files = self.storage.inner.files.write();
        let file = files
            .get_mut(&self.name)
            .ok_or_else(|| StorageError::NotFound(self.name.clone()))?;
        file.data.extend_from_slice(chunk);
        file.modified = now;
        Ok(())
    }

    async fn finish(self: Box<Self>) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn storage() -> (MemoryStorage, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ));
        (MemoryStorage::new(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_modified_follows_clock() {
        let (storage, clock) = storage();

        storage.write("a.png", b"abc").await.unwrap();
        clock.advance(chrono::Duration::minutes(5));
        storage.write("b.png", b"de").await.unwrap();

        let a = storage.metadata("a.png").await.unwrap();
        let b = storage.metadata("b.png").await.unwrap();
        assert_eq!(b.modified - a.modified, chrono::Duration::minutes(5));
        assert_eq!(a.size, 3);
    }

    #[tokio::test]
    async fn test_writer_appends_visibly() {
        let (storage, _clock) = storage();

        let mut writer = storage.create("big.bin").await.unwrap();
        writer.write_chunk(&[1, 2]).await.unwrap();
        assert_eq!(storage.read("big.bin").await.unwrap(), vec![1, 2]);
        writer.write_chunk(&[3]).await.unwrap();
        writer.finish().await.unwrap();

        assert_eq!(storage.read("big.bin").await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_protected_delete_fails() {
        let (storage, _clock) = storage();
        storage.write("locked.png", b"x").await.unwrap();
        storage.protect("locked.png");

        let result = storage.delete("locked.png").await;
        assert!(matches!(result, Err(StorageError::PermissionDenied(_))));
        assert!(storage.contains("locked.png"));
    }
}
