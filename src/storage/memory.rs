//! In-memory storage implementation for testing and in-process pipelines.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::Result;
use crate::storage::{LockManager, Storage, StorageError, StorageInput, StorageLock, StorageOutput};

type FileMap = Arc<Mutex<HashMap<String, Arc<[u8]>>>>;

/// An in-memory storage implementation.
///
/// Blobs are shared immutable buffers; an output publishes its buffer when
/// closed (or dropped), replacing any previous content atomically.
#[derive(Debug)]
pub struct MemoryStorage {
    files: FileMap,
    lock_manager: Arc<MemoryLockManager>,
}

impl MemoryStorage {
    /// Create an empty memory storage.
    pub fn new() -> Self {
        MemoryStorage {
            files: Arc::new(Mutex::new(HashMap::new())),
            lock_manager: Arc::new(MemoryLockManager::default()),
        }
    }

    /// Replace the content of a file directly.
    pub fn put(&self, name: &str, data: Vec<u8>) {
        self.files.lock().insert(name.to_string(), data.into());
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let data = self
            .files
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::FileNotFound(name.to_string()))?;

        Ok(Box::new(MemoryInput {
            cursor: Cursor::new(data),
        }))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        Ok(Box::new(MemoryOutput {
            name: name.to_string(),
            buffer: Vec::new(),
            files: Arc::clone(&self.files),
            closed: false,
        }))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.files.lock().contains_key(name)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        self.files.lock().remove(name);
        Ok(())
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let mut file_names: Vec<String> = self.files.lock().keys().cloned().collect();
        file_names.sort();
        Ok(file_names)
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        let mut files = self.files.lock();
        let data = files
            .remove(old_name)
            .ok_or_else(|| StorageError::FileNotFound(old_name.to_string()))?;
        files.insert(new_name.to_string(), data);
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }

    fn lock_manager(&self) -> Arc<dyn LockManager> {
        self.lock_manager.clone()
    }
}

/// A memory-based input implementation.
#[derive(Debug)]
pub struct MemoryInput {
    cursor: Cursor<Arc<[u8]>>,
}

impl Read for MemoryInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl StorageInput for MemoryInput {
    fn size(&self) -> Result<u64> {
        Ok(self.cursor.get_ref().len() as u64)
    }
}

/// A memory-based output implementation.
#[derive(Debug)]
pub struct MemoryOutput {
    name: String,
    buffer: Vec<u8>,
    files: FileMap,
    closed: bool,
}

impl Write for MemoryOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.closed {
            return Err(std::io::Error::other("Output is closed"));
        }

        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl StorageOutput for MemoryOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            let data: Arc<[u8]> = std::mem::take(&mut self.buffer).into();
            self.files.lock().insert(self.name.clone(), data);
            self.closed = true;
        }
        Ok(())
    }
}

impl Drop for MemoryOutput {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// A memory-based lock manager.
///
/// Each held lock maps to the generation that acquired it, so a holder whose
/// lock was broken does not release its successor.
#[derive(Debug, Default)]
pub struct MemoryLockManager {
    held: Arc<Mutex<HashMap<String, u64>>>,
    generation: AtomicU64,
}

impl LockManager for MemoryLockManager {
    fn acquire_lock(&self, name: &str) -> Result<Box<dyn StorageLock>> {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let mut held = self.held.lock();
        if held.contains_key(name) {
            return Err(StorageError::LockFailed(name.to_string()).into());
        }
        held.insert(name.to_string(), generation);

        Ok(Box::new(MemoryLock {
            name: name.to_string(),
            generation,
            held: Arc::clone(&self.held),
            released: false,
        }))
    }

    fn lock_exists(&self, name: &str) -> bool {
        self.held.lock().contains_key(name)
    }

    fn break_lock(&self, name: &str) -> Result<bool> {
        Ok(self.held.lock().remove(name).is_some())
    }
}

/// A held in-memory lock.
#[derive(Debug)]
struct MemoryLock {
    name: String,
    generation: u64,
    held: Arc<Mutex<HashMap<String, u64>>>,
    released: bool,
}

impl StorageLock for MemoryLock {
    fn name(&self) -> &str {
        &self.name
    }

    fn release(&mut self) -> Result<()> {
        if !self.released {
            let mut held = self.held.lock();
            if held.get(&self.name) == Some(&self.generation) {
                held.remove(&self.name);
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for MemoryLock {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_creation() {
        let storage = MemoryStorage::new();
        assert!(storage.list_files().unwrap().is_empty());
        assert_eq!(storage.location(), "memory");
    }

    #[test]
    fn test_create_and_read_file() {
        let storage = MemoryStorage::default();

        let mut output = storage.create_output("classifier.bin").unwrap();
        output.write_all(b"Hello, Memory!").unwrap();
        assert!(!storage.file_exists("classifier.bin"));
        output.close().unwrap();

        let mut input = storage.open_input("classifier.bin").unwrap();
        let mut buffer = Vec::new();
        input.read_to_end(&mut buffer).unwrap();

        assert_eq!(buffer, b"Hello, Memory!");
        assert_eq!(input.size().unwrap(), 14);
        assert_eq!(storage.list_files().unwrap(), vec!["classifier.bin"]);
    }

    #[test]
    fn test_output_published_on_drop() {
        let storage = MemoryStorage::default();
        {
            let mut output = storage.create_output("a.bin").unwrap();
            output.write_all(b"abc").unwrap();
        }
        assert_eq!(storage.read_all("a.bin").unwrap(), b"abc");
    }

    #[test]
    fn test_rename_replaces_target() {
        let storage = MemoryStorage::default();
        storage.put("manifest.json", b"old".to_vec());
        storage.put("manifest.json.tmp", b"new".to_vec());

        storage.rename_file("manifest.json.tmp", "manifest.json").unwrap();
        assert_eq!(storage.read_all("manifest.json").unwrap(), b"new");
        assert_eq!(storage.list_files().unwrap(), vec!["manifest.json"]);
        assert!(storage.rename_file("missing", "x").is_err());
    }

    #[test]
    fn test_lock_release() {
        let storage = MemoryStorage::default();
        let locks = storage.lock_manager();

        let mut lock = locks.acquire_lock("write").unwrap();
        assert!(locks.acquire_lock("write").is_err());
        lock.release().unwrap();
        lock.release().unwrap();
        assert!(!locks.lock_exists("write"));
        assert!(locks.acquire_lock("write").is_ok());
    }
}
