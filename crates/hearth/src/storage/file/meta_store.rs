use std::{
    collections::HashMap,
    io::Cursor,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};
use parking_lot::RwLock;

use crate::error::StorageError;
use crate::key::MetaDataKey;
use crate::storage::{
    KnownVersions, MetaStore,
    file::common::{
        SyncMode, ensure_directory_exists, is_hidden, validate_segment, write_atomically,
    },
};
use crate::{Database, MetaRequest};

/// Envelopes stored as the raw JSON they arrived as, at `<root>/<name>/<cid>`.
///
/// Directories under the root whose names are metadata keys
/// (`fp.<db>.<major>.<minor>`) seed the known-database-versions projection
/// when [`MetaStore::init`] runs.
pub struct FileMetaStore {
    root_dir: PathBuf,
    sync_mode: SyncMode,
    known_versions: KnownVersions,
    // writers exclude listings so a scan never races a rename or unlink
    io_lock: RwLock<()>,
}

impl FileMetaStore {
    #[tracing::instrument(level = "info", skip_all, fields(root_dir = %root_dir.as_ref().display()))]
    pub fn new<P: AsRef<Path>>(root_dir: P, sync_mode: SyncMode) -> Result<Self, StorageError> {
        let root_dir = root_dir.as_ref().to_path_buf();
        ensure_directory_exists(&root_dir)
            .map_err(|e| StorageError::from_io_error(e, "Failed to create meta directory"))?;
        Ok(FileMetaStore {
            root_dir,
            sync_mode,
            known_versions: KnownVersions::new(),
            io_lock: RwLock::new(()),
        })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn envelope_dir(&self, name: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root_dir.join(validate_segment(name, "database name")?))
    }

    fn envelope_path(&self, name: &str, cid: &str) -> Result<PathBuf, StorageError> {
        Ok(self
            .envelope_dir(name)?
            .join(validate_segment(cid, "content id")?))
    }

    /// Versioned directory names are applied in lexical order, so the
    /// lexically last version of a database wins regardless of listing order.
    fn scan_versions(&self) -> Result<HashMap<String, String>, StorageError> {
        let entries = std::fs::read_dir(&self.root_dir)
            .map_err(|e| StorageError::from_read_error(e, "scanning meta directory"))?;

        let mut dir_names = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| StorageError::from_read_error(e, "scanning meta directory"))?;
            let is_dir = entry
                .file_type()
                .map_err(|e| StorageError::from_read_error(e, "scanning meta directory"))?
                .is_dir();
            if !is_dir {
                continue;
            }
            if let Some(dir_name) = entry.file_name().to_str() {
                dir_names.push(dir_name.to_string());
            }
        }
        dir_names.sort();

        let mut versions = HashMap::new();
        for dir_name in dir_names {
            let mdk = MetaDataKey::new(dir_name.as_str());
            if mdk.is_valid() {
                tracing::trace!(dir_name = %dir_name, "Found versioned metadata directory");
                versions.insert(mdk.name().to_string(), mdk.version().to_string());
            }
        }

        Ok(versions)
    }

    fn read_envelope(path: &Path) -> Result<Option<MetaRequest>, StorageError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            // deleted between listing and reading
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::from_read_error(
                    e,
                    &format!("reading envelope {}", path.display()),
                ));
            }
        };
        MetaRequest::from_json(&bytes)
            .map(Some)
            .map_err(|e| {
                StorageError::from_serialization_error(
                    e,
                    &format!("parsing envelope {}", path.display()),
                )
            })
    }
}

impl MetaStore for FileMetaStore {
    #[tracing::instrument(level = "debug", skip(self), fields(root_dir = %self.root_dir.display()))]
    fn init(&self) -> Result<(), StorageError> {
        let _guard = self.io_lock.read();
        let versions = self.scan_versions()?;
        info!("Discovered {} versioned databases", versions.len());
        self.known_versions.replace(versions);
        Ok(())
    }

    fn put(
        &self,
        name: &str,
        _branch: &str,
        meta: &MetaRequest,
        raw: &[u8],
    ) -> Result<(), StorageError> {
        let path = self.envelope_path(name, &meta.cid)?;
        let _guard = self.io_lock.write();
        write_atomically(&path, &mut Cursor::new(raw), self.sync_mode).map_err(|e| {
            StorageError::from_io_error(e, &format!("writing envelope {}", path.display()))
        })?;
        debug!("Stored envelope {} for database {name}", meta.cid);
        Ok(())
    }

    fn meta(&self, name: &str, _branch: &str) -> Result<Vec<MetaRequest>, StorageError> {
        let dir = self.envelope_dir(name)?;
        let _guard = self.io_lock.read();

        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::from_read_error(
                    e,
                    &format!("listing {}", dir.display()),
                ));
            }
        };

        let mut items = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| StorageError::from_read_error(e, &format!("listing {}", dir.display())))?;
            if is_hidden(&entry.file_name().to_string_lossy()) {
                continue;
            }
            let path = entry.path();
            if path.is_dir() {
                warn!("Skipping unexpected directory {}", path.display());
                continue;
            }
            if let Some(meta) = Self::read_envelope(&path)? {
                items.push(meta);
            }
        }
        Ok(items)
    }

    fn delete(&self, name: &str, _branch: &str, cid: &str) -> Result<(), StorageError> {
        let path = self.envelope_path(name, cid)?;
        let _guard = self.io_lock.write();
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::from_io_error(
                e,
                &format!("deleting envelope {}", path.display()),
            )),
        }
    }

    fn databases(&self) -> Result<Vec<Database>, StorageError> {
        Ok(self.known_versions.snapshot())
    }

    fn observe_name(&self, name: &str) {
        self.known_versions.observe(name);
    }
}
