use crate::error::StorageError;
use crate::{Database, MetaRequest};
use log::{debug, warn};
use std::io::{Cursor, Read};

/// Binary content storage keyed by an opaque string (callers use
/// `<database>/<content-id>`).
pub trait BlobStore: Send + Sync {
    /// Store everything read from `content` under `key`, replacing any previous
    /// value. A concurrent `get` of the same key never observes a partial blob.
    fn set(&self, key: &str, content: &mut dyn Read) -> Result<(), StorageError>;

    /// Open the blob stored under `key`, `StorageError::NotFound` if absent.
    fn get(&self, key: &str) -> Result<Box<dyn Read + Send>, StorageError>;

    fn set_bytes(&self, key: &str, content: &[u8]) -> Result<(), StorageError> {
        self.set(key, &mut Cursor::new(content))
    }

    fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.get(key)?;
        let mut buffer = Vec::new();
        reader
            .read_to_end(&mut buffer)
            .map_err(|e| StorageError::from_read_error(e, key))?;
        Ok(buffer)
    }
}

/// Result of the best-effort parent cleanup that follows a metadata write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PruneOutcome {
    pub pruned: Vec<String>,
    pub failed: Vec<(String, StorageError)>,
}

impl PruneOutcome {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Per-database metadata envelopes plus the known-database-versions projection.
///
/// `branch` is accepted by every operation but does not partition storage yet;
/// all branches of a name share one set of envelopes.
pub trait MetaStore: Send + Sync {
    /// Rebuild any derived state from persisted data. Must run once before use.
    fn init(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Store `meta` under `(name, meta.cid)`, replacing a previous envelope with
    /// the same content id. `raw` is the envelope exactly as received.
    fn put(
        &self,
        name: &str,
        branch: &str,
        meta: &MetaRequest,
        raw: &[u8],
    ) -> Result<(), StorageError>;

    /// Every envelope stored under `name`, in no particular order.
    fn meta(&self, name: &str, branch: &str) -> Result<Vec<MetaRequest>, StorageError>;

    /// Remove one envelope; absent envelopes are not an error.
    fn delete(&self, name: &str, branch: &str, cid: &str) -> Result<(), StorageError>;

    /// Snapshot of the known-database-versions projection, sorted by name.
    fn databases(&self) -> Result<Vec<Database>, StorageError>;

    /// Feed `name` into the known-database-versions projection. Names that are
    /// not metadata keys are ignored.
    fn observe_name(&self, name: &str);

    /// Write the envelope, then prune its parents, then update the projection.
    ///
    /// Only the write can fail the call. Parent deletions are attempted after
    /// the write succeeded and their failures are reported in the returned
    /// outcome and logged.
    fn set(
        &self,
        name: &str,
        branch: &str,
        meta: &MetaRequest,
        raw: &[u8],
    ) -> Result<PruneOutcome, StorageError> {
        self.put(name, branch, meta, raw)?;
        // an envelope never supersedes itself
        let parents: Vec<String> = meta
            .parents
            .iter()
            .filter(|parent| **parent != meta.cid)
            .cloned()
            .collect();
        let outcome = self.prune_parents(name, branch, &parents);
        self.observe_name(name);
        Ok(outcome)
    }

    fn prune_parents(&self, name: &str, branch: &str, parents: &[String]) -> PruneOutcome {
        let mut outcome = PruneOutcome::default();
        for parent in parents {
            match self.delete(name, branch, parent) {
                Ok(()) => {
                    debug!("Pruned parent {parent} of database {name}");
                    outcome.pruned.push(parent.clone());
                }
                Err(e) => {
                    warn!("Failed to prune parent {parent} of database {name}: {e}");
                    outcome.failed.push((parent.clone(), e));
                }
            }
        }
        outcome
    }
}
