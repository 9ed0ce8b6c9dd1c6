use std::{
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::error::StorageError;
use crate::storage::{
    BlobStore,
    file::common::{SyncMode, ensure_directory_exists, resolve_key_path, write_atomically},
};

/// Blobs stored as plain files, one per key, at `<root>/<key>`.
pub struct FileBlobStore {
    root_dir: PathBuf,
    sync_mode: SyncMode,
}

impl FileBlobStore {
    #[tracing::instrument(level = "info", skip_all, fields(root_dir = %root_dir.as_ref().display()))]
    pub fn new<P: AsRef<Path>>(root_dir: P, sync_mode: SyncMode) -> Result<Self, StorageError> {
        let root_dir = root_dir.as_ref().to_path_buf();
        ensure_directory_exists(&root_dir)
            .map_err(|e| StorageError::from_io_error(e, "Failed to create data directory"))?;
        info!("Opened file blob store at {}", root_dir.display());
        Ok(FileBlobStore {
            root_dir,
            sync_mode,
        })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }
}

impl BlobStore for FileBlobStore {
    fn set(&self, key: &str, content: &mut dyn Read) -> Result<(), StorageError> {
        let path = resolve_key_path(&self.root_dir, key)?;
        let written = write_atomically(&path, content, self.sync_mode)
            .map_err(|e| StorageError::from_io_error(e, &format!("blob upload {key}")))?;
        debug!("Stored blob {key} ({written} bytes)");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Box<dyn Read + Send>, StorageError> {
        let path = resolve_key_path(&self.root_dir, key)?;
        match File::open(&path) {
            Ok(file) if file.metadata().map(|m| m.is_dir()).unwrap_or(false) => {
                Err(StorageError::NotFound {
                    key: key.to_string(),
                })
            }
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            // a blob where a namespace directory would be also means no such key
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
                ) =>
            {
                Err(StorageError::NotFound {
                    key: key.to_string(),
                })
            }
            Err(e) => Err(StorageError::from_read_error(
                e,
                &format!("opening blob {}", path.display()),
            )),
        }
    }
}
