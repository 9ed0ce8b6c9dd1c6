use crate::error::StorageError;
use std::{
    io::{self, Read},
    path::{Component, Path, PathBuf},
};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    #[default]
    None,
    Immediate,
}

// ================================================================================================
// FILE I/O UTILITIES
// ================================================================================================

pub fn ensure_directory_exists<P: AsRef<Path>>(dir: P) -> Result<(), io::Error> {
    let dir = dir.as_ref();
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Temporary files, lock files and other bookkeeping entries start with a dot.
pub fn is_hidden(file_name: &str) -> bool {
    file_name.starts_with('.')
}

/// Map a store key to a path under `root`, refusing keys that would escape it.
pub fn resolve_key_path(root: &Path, key: &str) -> Result<PathBuf, StorageError> {
    let relative = Path::new(key);
    let mut has_normal = false;
    for component in relative.components() {
        match component {
            Component::Normal(_) => has_normal = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(StorageError::InvalidKey {
                    key: key.to_string(),
                    reason: "key must stay inside the storage root".to_string(),
                });
            }
        }
    }
    if !has_normal {
        return Err(StorageError::InvalidKey {
            key: key.to_string(),
            reason: "key is empty".to_string(),
        });
    }
    Ok(root.join(relative))
}

/// Check that `segment` names exactly one visible path component.
pub fn validate_segment<'a>(segment: &'a str, what: &str) -> Result<&'a str, StorageError> {
    let reason = if segment.is_empty() {
        Some(format!("{what} is empty"))
    } else if segment.contains(['/', '\\']) {
        Some(format!("{what} contains a path separator"))
    } else if is_hidden(segment) {
        Some(format!("{what} starts with '.'"))
    } else {
        None
    };
    match reason {
        Some(reason) => Err(StorageError::InvalidKey {
            key: segment.to_string(),
            reason,
        }),
        None => Ok(segment),
    }
}

/// Write `content` to `target` so readers see either the old file or the
/// complete new one: data goes to a temporary file in the same directory,
/// which is then renamed over `target`. Missing parent directories are created.
pub fn write_atomically(
    target: &Path,
    content: &mut dyn Read,
    sync_mode: SyncMode,
) -> Result<u64, io::Error> {
    let parent = target
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    ensure_directory_exists(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    let written = io::copy(content, temp.as_file_mut())?;
    if sync_mode == SyncMode::Immediate {
        temp.as_file().sync_all()?;
    }
    temp.persist(target).map_err(|e| e.error)?;
    Ok(written)
}
