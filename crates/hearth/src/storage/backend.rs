use crate::error::StorageError;
use crate::storage::file::{FileBlobStore, FileMetaStore, SyncMode};
use crate::storage::{BlobStore, InMemoryBlobStore, InMemoryMetaStore, MetaStore};
use fs4::fs_std::FileExt;
use log::{debug, warn};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sysinfo::{ProcessesToUpdate, System};

const LOCK_FILE_NAME: &str = ".hearth.lock";

/// Storage backend configuration.
///
/// Chooses the concrete blob and metadata stores at startup. File backends hold
/// an exclusive lock on both root directories for as long as the value lives.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory storage, lost when the process exits.
    Memory,
    /// Blobs under `data_dir`, envelopes under `meta_dir`.
    File {
        sync_mode: SyncMode,
        data_dir: PathBuf,
        meta_dir: PathBuf,
        _data_lock: File,
        _meta_lock: File,
    },
}

impl Drop for StorageBackend {
    fn drop(&mut self) {
        if let StorageBackend::File {
            data_dir, meta_dir, ..
        } = self
        {
            for dir in [data_dir, meta_dir] {
                let lock_path = dir.join(LOCK_FILE_NAME);
                if lock_path.exists() {
                    if let Err(e) = std::fs::remove_file(&lock_path) {
                        warn!("Failed to remove lock file {lock_path:?}: {e}");
                    }
                }
            }
        }
    }
}

impl StorageBackend {
    pub fn new_memory() -> Self {
        StorageBackend::Memory
    }

    pub fn new_file(sync_mode: SyncMode) -> Result<Self, StorageError> {
        Self::new_file_with_paths(sync_mode, "./data", "./meta")
    }

    pub fn new_file_with_paths<D: AsRef<Path>, M: AsRef<Path>>(
        sync_mode: SyncMode,
        data_dir: D,
        meta_dir: M,
    ) -> Result<Self, StorageError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let meta_dir = meta_dir.as_ref().to_path_buf();
        let data_lock = acquire_directory_lock(&data_dir)?;
        let meta_lock = acquire_directory_lock(&meta_dir)?;
        Ok(StorageBackend::File {
            sync_mode,
            data_dir,
            meta_dir,
            _data_lock: data_lock,
            _meta_lock: meta_lock,
        })
    }

    pub fn create_blob_store(&self) -> Result<Arc<dyn BlobStore>, StorageError> {
        match self {
            StorageBackend::Memory => Ok(Arc::new(InMemoryBlobStore::new())),
            StorageBackend::File {
                sync_mode,
                data_dir,
                ..
            } => Ok(Arc::new(FileBlobStore::new(data_dir, *sync_mode)?)),
        }
    }

    /// Create the metadata store and run its `init`.
    pub fn create_meta_store(&self) -> Result<Arc<dyn MetaStore>, StorageError> {
        let store: Arc<dyn MetaStore> = match self {
            StorageBackend::Memory => Arc::new(InMemoryMetaStore::new()),
            StorageBackend::File {
                sync_mode,
                meta_dir,
                ..
            } => Arc::new(FileMetaStore::new(meta_dir, *sync_mode)?),
        };
        store.init()?;
        Ok(store)
    }
}

fn acquire_directory_lock<P: AsRef<Path>>(dir: P) -> Result<File, StorageError> {
    let dir = dir.as_ref();

    ensure_storage_directory_exists(dir)?;
    let lock_path = dir.join(LOCK_FILE_NAME);
    let lock_file = create_lock_file(&lock_path)?;

    match attempt_to_acquire_lock(&lock_file) {
        Ok(()) => {
            write_lock_metadata(&lock_file)?;
            debug!("Acquired directory lock {}", lock_path.display());
            Ok(lock_file)
        }
        Err(StorageError::LockAcquisitionFailed) => handle_lock_conflict(&lock_path, dir),
        Err(e) => Err(e),
    }
}

fn ensure_storage_directory_exists(dir: &Path) -> Result<(), StorageError> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .map_err(|e| StorageError::from_io_error(e, "Failed to create storage directory"))?;
    }
    Ok(())
}

fn create_lock_file(lock_path: &Path) -> Result<File, StorageError> {
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path)
        .map_err(|e| StorageError::from_io_error(e, "Failed to open lock file"))
}

fn attempt_to_acquire_lock(lock_file: &File) -> Result<(), StorageError> {
    match lock_file.try_lock_exclusive() {
        Ok(true) => Ok(()),
        Ok(false) | Err(_) => Err(StorageError::LockAcquisitionFailed),
    }
}

fn write_lock_metadata(lock_file: &File) -> Result<(), StorageError> {
    let pid = std::process::id();
    let timestamp = chrono::Utc::now().to_rfc3339();
    let lock_info = format!("PID: {pid}\nTimestamp: {timestamp}\n");

    let _ = lock_file.set_len(0);
    (&*lock_file)
        .write_all(lock_info.as_bytes())
        .map_err(|e| StorageError::from_io_error(e, "Failed to write lock metadata"))
}

fn handle_lock_conflict(lock_path: &Path, dir: &Path) -> Result<File, StorageError> {
    let existing_pid = extract_pid_from_lock_file(lock_path);

    match existing_pid {
        Some(pid) if pid != std::process::id() && is_process_alive(pid) => {
            Err(StorageError::DirectoryLocked {
                context: format!("{} is in use by another hearth instance", dir.display()),
                pid: Some(pid),
            })
        }
        Some(pid) if pid == std::process::id() => Err(StorageError::DirectoryLocked {
            context: format!("{} is already open in this process", dir.display()),
            pid: Some(pid),
        }),
        Some(_) | None => {
            if std::fs::remove_file(lock_path).is_ok() {
                acquire_directory_lock(dir)
            } else {
                Err(StorageError::DirectoryLocked {
                    context: format!("{} is in use by another hearth instance", dir.display()),
                    pid: None,
                })
            }
        }
    }
}

fn extract_pid_from_lock_file(lock_path: &Path) -> Option<u32> {
    std::fs::read_to_string(lock_path).ok().and_then(|content| {
        content
            .lines()
            .find(|line| line.starts_with("PID:"))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|pid_str| pid_str.parse::<u32>().ok())
    })
}

fn is_process_alive(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, false);
    system
        .processes()
        .get(&sysinfo::Pid::from(pid as usize))
        .is_some()
}
