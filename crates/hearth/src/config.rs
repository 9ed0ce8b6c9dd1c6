//! Startup configuration for a hearth store.

use crate::broadcast::DEFAULT_SUBSCRIBER_CAPACITY;
use crate::error::StorageError;
use crate::storage::{StorageBackend, file::SyncMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HearthConfig {
    pub backend: BackendKind,
    pub data_dir: PathBuf,
    pub meta_dir: PathBuf,
    pub sync_mode: SyncMode,
    /// Buffer size of channels handed out by `Hearth::subscribe`.
    pub subscriber_capacity: usize,
}

impl Default for HearthConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            data_dir: PathBuf::from("data"),
            meta_dir: PathBuf::from("meta"),
            sync_mode: SyncMode::None,
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
        }
    }
}

impl HearthConfig {
    /// Load configuration from a file.
    /// Supports both JSON (.json) and YAML (.yaml/.yml) formats based on file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| StorageError::from_read_error(e, "config loading"))?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        match extension.to_lowercase().as_str() {
            "json" => serde_json::from_str(&content)
                .map_err(|e| StorageError::from_serialization_error(e, "JSON config parsing")),
            "yaml" | "yml" => serde_yaml::from_str(&content)
                .map_err(|e| StorageError::from_serialization_error(e, "YAML config parsing")),
            _ => serde_json::from_str(&content)
                .or_else(|_| serde_yaml::from_str(&content))
                .map_err(|e| {
                    StorageError::from_serialization_error(
                        e,
                        "config parsing (tried both JSON and YAML)",
                    )
                }),
        }
    }

    pub fn build_backend(&self) -> Result<StorageBackend, StorageError> {
        match self.backend {
            BackendKind::Memory => Ok(StorageBackend::new_memory()),
            BackendKind::File => {
                StorageBackend::new_file_with_paths(self.sync_mode, &self.data_dir, &self.meta_dir)
            }
        }
    }
}
