pub mod backend;
pub mod file;
pub mod memory;
pub mod r#trait;

// Re-exports for ergonomics
pub use backend::StorageBackend;
pub use memory::{InMemoryBlobStore, InMemoryMetaStore};
pub use r#trait::{BlobStore, MetaStore, PruneOutcome};

use crate::Database;
use crate::key::MetaDataKey;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Database name -> most recently observed version. Last write wins per name.
#[derive(Debug, Default)]
pub struct KnownVersions {
    versions: RwLock<HashMap<String, String>>,
}

impl KnownVersions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the version encoded in `name`; returns false if `name` is not a
    /// metadata key.
    pub fn observe(&self, name: &str) -> bool {
        let mdk = MetaDataKey::new(name);
        if !mdk.is_valid() {
            return false;
        }
        self.versions
            .write()
            .insert(mdk.name().to_string(), mdk.version().to_string());
        true
    }

    /// Replace the projection wholesale, used when rebuilding from disk.
    pub fn replace(&self, versions: HashMap<String, String>) {
        *self.versions.write() = versions;
    }

    pub fn snapshot(&self) -> Vec<Database> {
        let mut databases: Vec<Database> = self
            .versions
            .read()
            .iter()
            .map(|(name, version)| Database {
                name: name.clone(),
                version: version.clone(),
            })
            .collect();
        databases.sort_by(|a, b| a.name.cmp(&b.name));
        databases
    }
}
