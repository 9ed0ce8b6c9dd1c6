use super::{BlobStore, KnownVersions, MetaStore};
use crate::error::StorageError;
use crate::{Database, MetaRequest};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::Arc;

/// Blobs held in memory behind one read/write lock for the whole store.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<String, Arc<[u8]>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn set(&self, key: &str, content: &mut dyn Read) -> Result<(), StorageError> {
        // buffer outside the lock; the map only ever sees complete blobs
        let mut buffer = Vec::new();
        content
            .read_to_end(&mut buffer)
            .map_err(|e| StorageError::from_read_error(e, "memory blob upload"))?;
        self.blobs.write().insert(key.to_string(), buffer.into());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Box<dyn Read + Send>, StorageError> {
        match self.blobs.read().get(key) {
            Some(blob) => Ok(Box::new(Cursor::new(Arc::clone(blob)))),
            None => Err(StorageError::NotFound {
                key: key.to_string(),
            }),
        }
    }
}

/// Envelopes held in memory, sharded by database name.
#[derive(Debug, Default)]
pub struct InMemoryMetaStore {
    meta: DashMap<String, HashMap<String, MetaRequest>>,
    known_versions: KnownVersions,
}

impl InMemoryMetaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetaStore for InMemoryMetaStore {
    fn put(
        &self,
        name: &str,
        _branch: &str,
        meta: &MetaRequest,
        _raw: &[u8],
    ) -> Result<(), StorageError> {
        self.meta
            .entry(name.to_string())
            .or_default()
            .insert(meta.cid.clone(), meta.clone());
        Ok(())
    }

    fn meta(&self, name: &str, _branch: &str) -> Result<Vec<MetaRequest>, StorageError> {
        Ok(self
            .meta
            .get(name)
            .map(|by_cid| by_cid.values().cloned().collect())
            .unwrap_or_default())
    }

    fn delete(&self, name: &str, _branch: &str, cid: &str) -> Result<(), StorageError> {
        if let Some(mut by_cid) = self.meta.get_mut(name) {
            by_cid.remove(cid);
        }
        Ok(())
    }

    fn databases(&self) -> Result<Vec<Database>, StorageError> {
        Ok(self.known_versions.snapshot())
    }

    fn observe_name(&self, name: &str) {
        self.known_versions.observe(name);
    }
}
