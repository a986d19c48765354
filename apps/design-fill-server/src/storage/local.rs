//! Local filesystem storage

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncWriteExt, BufWriter};

use super::{StorageWriter, StoredFile, UploadStorage};
use crate::error::StorageError;

/// Uploads are written through a buffer of this size
const WRITE_BUFFER_BYTES: usize = 1024 * 1024;

/// Flat directory on the local disk
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Open `base_path`, creating it if missing
    pub fn open(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)
            .map_err(|e| StorageError::from_io(base_path.display().to_string(), e))?;
        Ok(Self { base_path })
    }

    fn file_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && !name.contains('\0');
        if !valid {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.base_path.join(name))
    }
}

fn to_stored_file(name: String, metadata: &std::fs::Metadata) -> std::io::Result<StoredFile> {
    let modified: DateTime<Utc> = metadata.modified()?.into();
    Ok(StoredFile {
        name,
        size: metadata.len(),
        modified,
    })
}

#[async_trait::async_trait]
impl UploadStorage for LocalStorage {
    async fn list_files(&self) -> Result<Vec<StoredFile>, StorageError> {
        let dir = self.base_path.display().to_string();
        let mut entries = tokio::fs::read_dir(&self.base_path)
            .await
            .map_err(|e| StorageError::from_io(dir.clone(), e))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::from_io(dir.clone(), e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            // Follows symlinks, like a plain stat
            let metadata = match tokio::fs::metadata(entry.path()).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::debug!(file = %name, error = %e, "Skipping entry that could not be stat'd");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            match to_stored_file(name.clone(), &metadata) {
                Ok(file) => files.push(file),
                Err(e) => {
                    tracing::debug!(file = %name, error = %e, "Skipping entry without modification time");
                }
            }
        }

        Ok(files)
    }

    async fn metadata(&self, name: &str) -> Result<StoredFile, StorageError> {
        let path = self.file_path(name)?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| StorageError::from_io(name, e))?;
        if !metadata.is_file() {
            return Err(StorageError::NotFound(name.to_string()));
        }
        to_stored_file(name.to_string(), &metadata).map_err(|e| StorageError::from_io(name, e))
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.file_path(name)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| StorageError::from_io(name, e))
    }

    async fn write(&self, name: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.file_path(name)?;
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| StorageError::from_io(name, e))
    }

    async fn create(&self, name: &str) -> Result<Box<dyn StorageWriter>, StorageError> {
        let path = self.file_path(name)?;
        let file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| StorageError::from_io(name, e))?;
        Ok(Box::new(LocalWriter {
            name: name.to_string(),
            inner: BufWriter::with_capacity(WRITE_BUFFER_BYTES, file),
        }))
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let from_path = self.file_path(from)?;
        let to_path = self.file_path(to)?;
        tokio::fs::rename(&from_path, &to_path)
            .await
            .map_err(|e| StorageError::from_io(from, e))
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let path = self.file_path(name)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| StorageError::from_io(name, e))
    }
}

struct LocalWriter {
    name: String,
    inner: BufWriter<tokio::fs::File>,
}

#[async_trait::async_trait]
impl StorageWriter for LocalWriter {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        self.inner
            .write_all(chunk)
            .await
            .map_err(|e| StorageError::from_io(self.name.clone(), e))
    }

    async fn finish(self: Box<Self>) -> Result<(), StorageError> {
        let LocalWriter { name, mut inner } = *self;
        inner.flush().await.map_err(|e| StorageError::from_io(name, e))
    }
}

// ============================================================================
// Tests
// ============================================================================
