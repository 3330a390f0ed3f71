//! File-based storage implementation.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};
use uuid::Uuid;

use crate::error::{PolarityError, Result};
use crate::storage::{LockManager, Storage, StorageError, StorageInput, StorageLock, StorageOutput};

/// Configuration for file-based storage.
#[derive(Debug, Clone)]
pub struct FileStorageConfig {
    /// Directory holding the blobs; created if missing.
    pub path: PathBuf,
}

impl FileStorageConfig {
    /// Create a configuration for the given directory.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        FileStorageConfig {
            path: path.as_ref().to_path_buf(),
        }
    }
}

/// A file-based storage implementation.
#[derive(Debug)]
pub struct FileStorage {
    /// The root directory for storage.
    directory: PathBuf,
    /// Lock manager for coordinating access.
    lock_manager: Arc<FileLockManager>,
}

impl FileStorage {
    /// Open (and create if needed) the storage directory.
    pub fn new(config: FileStorageConfig) -> Result<Self> {
        let directory = config.path;

        if !directory.exists() {
            std::fs::create_dir_all(&directory).map_err(|e| {
                PolarityError::storage(format!(
                    "Failed to create directory {}: {e}",
                    directory.display()
                ))
            })?;
        }

        if !directory.is_dir() {
            return Err(PolarityError::storage(format!(
                "Path is not a directory: {}",
                directory.display()
            )));
        }

        let lock_manager = Arc::new(FileLockManager::new(directory.clone()));

        Ok(FileStorage {
            directory,
            lock_manager,
        })
    }

    /// Get the storage directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Get the full path for a file name.
    fn file_path(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }
}

fn not_found_or_io(name: &str, e: std::io::Error) -> StorageError {
    if e.kind() == ErrorKind::NotFound {
        StorageError::FileNotFound(name.to_string())
    } else {
        StorageError::IoError(format!("{name}: {e}"))
    }
}

impl Storage for FileStorage {
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>> {
        let file = File::open(self.file_path(name)).map_err(|e| not_found_or_io(name, e))?;
        Ok(Box::new(FileInput::new(file)?))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.file_path(name))
            .map_err(|e| StorageError::IoError(format!("{name}: {e}")))?;

        Ok(Box::new(FileOutput {
            writer: BufWriter::new(file),
        }))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.file_path(name).is_file()
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        match std::fs::remove_file(self.file_path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(StorageError::IoError(format!("Failed to delete file {name}: {e}")).into())
            }
        }
    }

    fn list_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();

        for entry in
            std::fs::read_dir(&self.directory).map_err(|e| StorageError::IoError(e.to_string()))?
        {
            let entry = entry.map_err(|e| StorageError::IoError(e.to_string()))?;
            let path = entry.path();

            if path.is_file()
                && let Some(name) = path.file_name().and_then(|n| n.to_str())
            {
                files.push(name.to_string());
            }
        }

        files.sort();
        Ok(files)
    }

    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()> {
        std::fs::rename(self.file_path(old_name), self.file_path(new_name)).map_err(|e| {
            StorageError::IoError(format!("Failed to rename {old_name} to {new_name}: {e}"))
        })?;
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        // Persist renames by syncing the directory entry where the platform allows it.
        #[cfg(unix)]
        File::open(&self.directory)
            .and_then(|dir| dir.sync_all())
            .map_err(|e| StorageError::IoError(format!("Failed to sync directory: {e}")))?;
        Ok(())
    }

    fn location(&self) -> String {
        self.directory.display().to_string()
    }

    fn lock_manager(&self) -> Arc<dyn LockManager> {
        self.lock_manager.clone()
    }
}

/// A file input implementation.
#[derive(Debug)]
pub struct FileInput {
    reader: BufReader<File>,
    size: u64,
}

impl FileInput {
    fn new(file: File) -> Result<Self> {
        let size = file
            .metadata()
            .map_err(|e| PolarityError::storage(format!("Failed to get file metadata: {e}")))?
            .len();

        Ok(FileInput {
            reader: BufReader::new(file),
            size,
        })
    }
}

impl Read for FileInput {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl StorageInput for FileInput {
    fn size(&self) -> Result<u64> {
        Ok(self.size)
    }
}

/// A file output implementation.
#[derive(Debug)]
pub struct FileOutput {
    writer: BufWriter<File>,
}

impl Write for FileOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl StorageOutput for FileOutput {
    fn flush_and_sync(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| PolarityError::storage(format!("Failed to flush: {e}")))?;

        self.writer
            .get_ref()
            .sync_all()
            .map_err(|e| PolarityError::storage(format!("Failed to sync: {e}")))?;

        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.flush_and_sync()
    }
}

/// A file-based lock manager.
///
/// A lock is a `<name>.lock` file created exclusively, so it also excludes
/// writers in other processes. The file records the owner pid and a token
/// unique to the holder.
#[derive(Debug)]
pub struct FileLockManager {
    directory: PathBuf,
}

impl FileLockManager {
    fn new(directory: PathBuf) -> Self {
        FileLockManager { directory }
    }

    fn lock_path(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{name}.lock"))
    }
}

impl LockManager for FileLockManager {
    fn acquire_lock(&self, name: &str) -> Result<Box<dyn StorageLock>> {
        let path = self.lock_path(name);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == ErrorKind::AlreadyExists {
                    let owner = std::fs::read_to_string(&path).unwrap_or_default();
                    let pid = owner.split_whitespace().next().unwrap_or("unknown");
                    StorageError::LockFailed(format!("{} is held by pid {pid}", path.display()))
                } else {
                    StorageError::IoError(e.to_string())
                }
            })?;
        let token = format!("{} {}", std::process::id(), Uuid::new_v4());
        if let Err(e) = writeln!(file, "{token}") {
            let _ = std::fs::remove_file(&path);
            return Err(StorageError::IoError(format!("{}: {e}", path.display())).into());
        }

        debug!("acquired lock {}", path.display());

        Ok(Box::new(FileLock {
            name: name.to_string(),
            path,
            token,
            released: false,
        }))
    }

    fn lock_exists(&self, name: &str) -> bool {
        self.lock_path(name).exists()
    }

    fn break_lock(&self, name: &str) -> Result<bool> {
        let path = self.lock_path(name);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                warn!("broke lock {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::IoError(format!(
                "Failed to break lock {}: {e}",
                path.display()
            ))
            .into()),
        }
    }
}

/// A held lock file.
#[derive(Debug)]
struct FileLock {
    name: String,
    path: PathBuf,
    token: String,
    released: bool,
}

impl StorageLock for FileLock {
    fn name(&self) -> &str {
        &self.name
    }

    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim_end() == self.token => std::fs::remove_file(&self.path)
                .map_err(|e| PolarityError::storage(format!("Failed to release lock: {e}"))),
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PolarityError::storage(format!("Failed to release lock: {e}"))),
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> (TempDir, FileStorage) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(FileStorageConfig::new(temp_dir.path())).unwrap();
        (temp_dir, storage)
    }

    #[test]
    fn test_creates_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("model").join("v1");
        let storage = FileStorage::new(FileStorageConfig::new(&nested)).unwrap();
        assert!(nested.is_dir());
        assert_eq!(storage.directory(), nested.as_path());
    }

    #[test]
    fn test_create_and_read_file() {
        let (_temp_dir, storage) = create_test_storage();

        let mut output = storage.create_output("vectorizer.bin").unwrap();
        output.write_all(b"Hello, World!").unwrap();
        output.close().unwrap();

        let input = storage.open_input("vectorizer.bin").unwrap();
        assert_eq!(input.size().unwrap(), 13);
        assert_eq!(storage.read_all("vectorizer.bin").unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_file_operations() {
        let (_temp_dir, storage) = create_test_storage();

        assert!(!storage.file_exists("classifier.bin"));
        storage.write_atomic("classifier.bin", b"weights").unwrap();
        assert!(storage.file_exists("classifier.bin"));
        assert!(!storage.file_exists("classifier.bin.tmp"));
        assert_eq!(storage.list_files().unwrap(), vec!["classifier.bin"]);

        storage.rename_file("classifier.bin", "old.bin").unwrap();
        assert!(!storage.file_exists("classifier.bin"));
        assert!(storage.file_exists("old.bin"));

        storage.delete_file("old.bin").unwrap();
        storage.delete_file("old.bin").unwrap();
        assert!(!storage.file_exists("old.bin"));
        storage.sync().unwrap();
    }

    #[test]
    fn test_file_not_found() {
        let (_temp_dir, storage) = create_test_storage();

        let err = storage.open_input("missing.bin").unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }

    #[test]
    fn test_lock_is_exclusive_and_released_on_drop() {
        let (temp_dir, storage) = create_test_storage();
        let locks = storage.lock_manager();

        let lock = locks.acquire_lock("write").unwrap();
        assert_eq!(lock.name(), "write");
        assert!(temp_dir.path().join("write.lock").exists());

        let err = locks.acquire_lock("write").unwrap_err().to_string();
        assert!(err.contains("Failed to acquire lock"), "{err}");
        assert!(err.contains(&std::process::id().to_string()), "{err}");

        drop(lock);
        assert!(!temp_dir.path().join("write.lock").exists());
        assert!(!locks.lock_exists("write"));
        assert!(locks.acquire_lock("write").is_ok());
    }

    #[test]
    fn test_stale_lock_is_broken() {
        let (temp_dir, storage) = create_test_storage();
        let locks = storage.lock_manager();

        // A crashed writer leaves its lock file behind.
        std::fs::write(temp_dir.path().join("write.lock"), "4194304 stale\n").unwrap();
        let err = locks.acquire_lock("write").unwrap_err().to_string();
        assert!(err.contains("pid 4194304"), "{err}");

        assert!(locks.break_lock("write").unwrap());
        assert!(!locks.break_lock("write").unwrap());
        let lock = locks.acquire_lock("write").unwrap();
        assert!(locks.lock_exists("write"));
        drop(lock);
        assert!(!locks.lock_exists("write"));
    }

    #[test]
    fn test_release_leaves_a_newer_holder_alone() {
        let (_temp_dir, storage) = create_test_storage();
        let locks = storage.lock_manager();

        let first = locks.acquire_lock("write").unwrap();
        assert!(locks.break_lock("write").unwrap());
        let second = locks.acquire_lock("write").unwrap();

        drop(first);
        assert!(locks.lock_exists("write"));
        drop(second);
        assert!(!locks.lock_exists("write"));
    }
}
