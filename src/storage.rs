//! Storage abstraction layer for Polarity.
//!
//! Fitted artifacts are persisted through a small blob store keyed by file
//! name. The pipeline only ever talks to the [`Storage`] trait, so the file
//! backend used by the CLI and the memory backend used by tests and
//! in-process training are interchangeable.
//!
//! # Storage Types
//!
//! ## FileStorage
//! - One directory on disk, one file per blob
//! - Lock files (`<name>.lock`) created with `create_new` for writer exclusion;
//!   a lock left by a crashed writer stays until broken with
//!   [`LockManager::break_lock`]
//!
//! ## MemoryStorage
//! - Blobs held in a shared map
//! - Fast but non-persistent
//!
//! # Example
//!
//! ```
//! use polarity::storage::Storage;
//! use polarity::storage::memory::MemoryStorage;
//! use std::io::{Read, Write};
//!
//! # fn main() -> polarity::error::Result<()> {
//! let storage = MemoryStorage::default();
//!
//! let mut output = storage.create_output("classifier.bin")?;
//! output.write_all(b"weights")?;
//! output.close()?;
//!
//! let mut input = storage.open_input("classifier.bin")?;
//! let mut buffer = Vec::new();
//! input.read_to_end(&mut buffer)?;
//! assert_eq!(buffer, b"weights");
//! # Ok(())
//! # }
//! ```

use std::io::{Read, Write};
use std::sync::Arc;

use thiserror::Error;

use crate::error::{PolarityError, Result};

pub mod file;
pub mod memory;

/// A trait for storage backends that can store and retrieve named blobs.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Open a file for reading. The file must exist.
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>>;

    /// Create a file for writing, truncating any existing content.
    ///
    /// The output must be closed for the content to be flushed and synced.
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    /// Check if a file exists.
    fn file_exists(&self, name: &str) -> bool;

    /// Delete a file. Deleting a missing file succeeds.
    fn delete_file(&self, name: &str) -> Result<()>;

    /// List all files in the storage, sorted by name.
    fn list_files(&self) -> Result<Vec<String>>;

    /// Rename a file, replacing any file already called `new_name`.
    ///
    /// Writers use write-to-temp then rename so that readers never observe
    /// a partially written blob.
    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()>;

    /// Sync all pending writes to storage.
    fn sync(&self) -> Result<()>;

    /// Lock manager coordinating writers of this storage.
    fn lock_manager(&self) -> Arc<dyn LockManager>;

    /// Human-readable location of this storage, used in error messages.
    fn location(&self) -> String;

    /// Read a whole file into memory.
    fn read_all(&self, name: &str) -> Result<Vec<u8>> {
        let mut input = self.open_input(name)?;
        let mut buffer = Vec::with_capacity(input.size()? as usize);
        input.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    /// Write `data` under `name` via a temporary file and a rename.
    fn write_atomic(&self, name: &str, data: &[u8]) -> Result<()> {
        let temp_name = format!("{name}.tmp");
        let mut output = self.create_output(&temp_name)?;
        let written = output
            .write_all(data)
            .map_err(PolarityError::from)
            .and_then(|()| output.close());
        if let Err(e) = written {
            drop(output);
            let _ = self.delete_file(&temp_name);
            return Err(e);
        }
        self.rename_file(&temp_name, name)
    }
}

/// A trait for reading data from storage.
pub trait StorageInput: Read + Send + std::fmt::Debug {
    /// Get the size of the input stream.
    fn size(&self) -> Result<u64>;
}

/// A trait for writing data to storage.
pub trait StorageOutput: Write + Send + std::fmt::Debug {
    /// Flush and sync the output to storage.
    fn flush_and_sync(&mut self) -> Result<()>;

    /// Flush, sync and publish the output.
    fn close(&mut self) -> Result<()>;
}

/// A lock manager for coordinating access to storage.
pub trait LockManager: Send + Sync + std::fmt::Debug {
    /// Acquire a lock with the given name, failing if it is held.
    fn acquire_lock(&self, name: &str) -> Result<Box<dyn StorageLock>>;

    /// Check if a lock with the given name is held.
    fn lock_exists(&self, name: &str) -> bool;

    /// Forcibly remove a lock left behind by a writer that no longer runs.
    ///
    /// Returns whether a lock was present. Breaking the lock of a live
    /// writer lets a second writer in, so callers only do this on explicit
    /// operator request.
    fn break_lock(&self, name: &str) -> Result<bool>;
}

/// A lock on a resource in storage.
///
/// Dropping the lock releases it.
pub trait StorageLock: Send + std::fmt::Debug {
    /// Get the name of the lock.
    fn name(&self) -> &str;

    /// Release the lock.
    ///
    /// A lock that was broken and since taken by another writer is left
    /// in place.
    fn release(&mut self) -> Result<()>;
}

/// Error types specific to storage operations.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(String),

    /// Lock acquisition failed.
    #[error("Failed to acquire lock: {0}")]
    LockFailed(String),
}

impl From<StorageError> for PolarityError {
    fn from(err: StorageError) -> Self {
        PolarityError::storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::FileNotFound("classifier.bin".to_string());
        assert_eq!(err.to_string(), "File not found: classifier.bin");

        let err = StorageError::LockFailed("write".to_string());
        assert_eq!(err.to_string(), "Failed to acquire lock: write");

        let err: PolarityError = StorageError::IoError("disk full".to_string()).into();
        assert!(matches!(err, PolarityError::Storage(_)));
    }

    #[test]
    fn test_write_atomic_and_read_all() {
        let storage = MemoryStorage::default();
        storage.write_atomic("artifacts.json", b"{}").unwrap();
        assert_eq!(storage.read_all("artifacts.json").unwrap(), b"{}");
        assert_eq!(storage.list_files().unwrap(), vec!["artifacts.json"]);
    }

    #[test]
    fn test_break_lock() {
        let storage = MemoryStorage::default();
        let locks = storage.lock_manager();

        let held = locks.acquire_lock("write").unwrap();
        assert!(locks.lock_exists("write"));
        assert!(locks.break_lock("write").unwrap());
        assert!(!locks.lock_exists("write"));
        assert!(!locks.break_lock("write").unwrap());

        let again = locks.acquire_lock("write").unwrap();
        drop(held);
        assert!(locks.lock_exists("write"));
        drop(again);
        assert!(!locks.lock_exists("write"));
    }
}
