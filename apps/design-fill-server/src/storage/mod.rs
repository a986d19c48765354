//! Storage backends for the upload directory
//!
//! Everything the server persists lives in one flat directory. Handlers and
//! the retention sweeper reach it only through [`UploadStorage`], so tests can
//! swap the disk for [`MemoryStorage`].

mod local;
mod memory;
mod types;

pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use types::*;

use crate::error::StorageError;

/// Operations over a flat directory of named files
#[async_trait::async_trait]
pub trait UploadStorage: Send + Sync {
    /// Regular files directly in the directory. Entries that cannot be
    /// stat'd are skipped.
    async fn list_files(&self) -> Result<Vec<StoredFile>, StorageError>;

    /// Metadata for one file
    async fn metadata(&self, name: &str) -> Result<StoredFile, StorageError>;

    /// Whole file contents
    async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError>;

    /// Create or replace a file in one go
    async fn write(&self, name: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Create or truncate a file for chunked writing
    async fn create(&self, name: &str) -> Result<Box<dyn StorageWriter>, StorageError>;

    /// Move a file onto another name, replacing any existing file
    async fn rename(&self, from: &str, to: &str) -> Result<(), StorageError>;

    async fn delete(&self, name: &str) -> Result<(), StorageError>;
}

/// Incremental writer returned by [`UploadStorage::create`]
#[async_trait::async_trait]
pub trait StorageWriter: Send {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), StorageError>;

    /// Flush and close. Dropping without finishing may lose buffered bytes.
    async fn finish(self: Box<Self>) -> Result<(), StorageError>;
}
