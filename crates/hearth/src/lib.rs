use serde::{Deserialize, Deserializer, Serialize};
use std::io::Read;
use std::sync::Arc;
use std::time::Instant;
use storage::{BlobStore, MetaStore, StorageBackend};
use tokio::sync::mpsc::{self, Receiver, Sender};

pub mod broadcast;
pub mod config;
pub mod error;
pub mod key;
pub mod storage;
pub mod telemetry;

pub use broadcast::{BroadcastHub, Delivery};
pub use config::HearthConfig;
pub use error::{HearthError, StorageError};

// Re-export logging macros for consistent usage across the crate
pub use log::{debug, error, info, trace, warn};

// =============================================================================
// CORE DATA STRUCTURES
// =============================================================================

/// One revision of a database's metadata. `data` is an opaque base64 payload;
/// `parents` are the revisions this one supersedes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaRequest {
    pub cid: String,
    #[serde(default)]
    pub data: String,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub parents: Vec<String>,
}

/// Event delivered to metadata subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaItems {
    pub items: Vec<MetaRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Database {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRequestResponse {
    #[serde(rename = "uploadURL")]
    pub upload_url: String,
    #[serde(rename = "Key")]
    pub key: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl MetaRequest {
    pub fn new(cid: impl Into<String>, data: impl Into<String>, parents: Vec<String>) -> Self {
        Self {
            cid: cid.into(),
            data: data.into(),
            parents,
        }
    }

    pub fn from_json(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl MetaItems {
    pub fn single(meta: MetaRequest) -> Self {
        Self { items: vec![meta] }
    }
}

impl Database {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

// =============================================================================
// STORE FACADE
// =============================================================================

/// Blob storage, metadata storage and metadata change notifications behind one
/// handle. This is what a transport layer talks to.
pub struct Hearth {
    blob_store: Arc<dyn BlobStore>,
    meta_store: Arc<dyn MetaStore>,
    meta_hub: BroadcastHub<MetaItems>,
    subscriber_capacity: usize,
    // keeps directory locks alive for file backends
    _storage_backend: Option<StorageBackend>,
}

impl Default for Hearth {
    fn default() -> Self {
        Self::new()
    }
}

impl Hearth {
    /// In-memory store.
    pub fn new() -> Self {
        Self::with_stores(
            Arc::new(storage::InMemoryBlobStore::new()),
            Arc::new(storage::InMemoryMetaStore::new()),
        )
    }

    /// Build on already constructed stores. The metadata store must already
    /// have been initialized.
    pub fn with_stores(blob_store: Arc<dyn BlobStore>, meta_store: Arc<dyn MetaStore>) -> Self {
        Hearth {
            blob_store,
            meta_store,
            meta_hub: BroadcastHub::new(),
            subscriber_capacity: broadcast::DEFAULT_SUBSCRIBER_CAPACITY,
            _storage_backend: None,
        }
    }

    pub fn with_storage_backend(storage_backend: StorageBackend) -> Result<Self, HearthError> {
        let blob_store = storage_backend.create_blob_store()?;
        let meta_store = storage_backend.create_meta_store()?;
        let mut hearth = Self::with_stores(blob_store, meta_store);
        hearth._storage_backend = Some(storage_backend);
        Ok(hearth)
    }

    pub fn from_config(config: &HearthConfig) -> Result<Self, HearthError> {
        let mut hearth = Self::with_storage_backend(config.build_backend()?)?;
        hearth.subscriber_capacity = config.subscriber_capacity.max(1);
        info!(
            "Hearth ready with {:?} backend, subscriber capacity {}",
            config.backend, hearth.subscriber_capacity
        );
        Ok(hearth)
    }

    /// Where a client should upload the CAR file `car` of database `name`.
    pub fn prepare_data(&self, name: &str, car: &str) -> UploadRequestResponse {
        UploadRequestResponse {
            upload_url: format!("/api/upload/data/{name}/{car}.car"),
            key: format!("data/{name}/{car}.car"),
        }
    }

    #[tracing::instrument(level = "debug", skip(self, body))]
    pub fn set_data(&self, name: &str, cid: &str, body: &mut dyn Read) -> Result<(), HearthError> {
        let begin = Instant::now();
        let result = self
            .blob_store
            .set(&blob_key(name, cid), body)
            .map_err(HearthError::from);
        traced("SetData", begin, result)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub fn data(&self, name: &str, cid: &str) -> Result<Box<dyn Read + Send>, HearthError> {
        let begin = Instant::now();
        let result = self
            .blob_store
            .get(&blob_key(name, cid))
            .map_err(|e| match e {
                StorageError::NotFound { .. } => HearthError::DataNotFound {
                    name: name.to_string(),
                    cid: cid.to_string(),
                },
                other => HearthError::Storage(other),
            });
        traced("Data", begin, result)
    }

    /// Store `meta` (with `raw` as its exact serialized form), then notify
    /// subscribers. Notification is best effort and never fails the call.
    #[tracing::instrument(level = "debug", skip(self, meta, raw), fields(cid = %meta.cid))]
    pub fn set_meta(
        &self,
        name: &str,
        branch: &str,
        meta: MetaRequest,
        raw: &[u8],
    ) -> Result<(), HearthError> {
        let begin = Instant::now();
        let outcome = match self.meta_store.set(name, branch, &meta, raw) {
            Ok(outcome) => outcome,
            Err(e) => return traced("SetMeta", begin, Err(HearthError::from(e))),
        };
        if !outcome.is_clean() {
            debug!(
                "{} of {} parents left in place for {name}",
                outcome.failed.len(),
                outcome.failed.len() + outcome.pruned.len()
            );
        }

        let delivery = self.meta_hub.submit(MetaItems::single(meta));
        trace!(
            "Broadcast delivered to {}, dropped for {}",
            delivery.delivered, delivery.dropped
        );
        traced("SetMeta", begin, Ok(()))
    }

    /// Decode a raw envelope body and store it verbatim.
    pub fn set_meta_json(
        &self,
        name: &str,
        branch: &str,
        raw: &[u8],
    ) -> Result<MetaRequest, HearthError> {
        let meta = MetaRequest::from_json(raw).map_err(|e| HearthError::InvalidEnvelope {
            reason: e.to_string(),
        })?;
        self.set_meta(name, branch, meta.clone(), raw)?;
        Ok(meta)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub fn meta(&self, name: &str, branch: &str) -> Result<Vec<MetaRequest>, HearthError> {
        let begin = Instant::now();
        let result = self
            .meta_store
            .meta(name, branch)
            .map_err(HearthError::from);
        traced("Meta", begin, result)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub fn databases(&self) -> Result<Vec<Database>, HearthError> {
        let begin = Instant::now();
        let result = self.meta_store.databases().map_err(HearthError::from);
        traced("Databases", begin, result)
    }

    pub fn register_meta(&self, channel: Sender<MetaItems>) {
        self.meta_hub.register(channel);
    }

    pub fn unregister_meta(&self, channel: &Sender<MetaItems>) {
        self.meta_hub.unregister(channel);
    }

    /// Create a channel with the configured capacity and register it.
    pub fn subscribe(&self) -> (Sender<MetaItems>, Receiver<MetaItems>) {
        let (tx, rx) = mpsc::channel(self.subscriber_capacity);
        self.register_meta(tx.clone());
        (tx, rx)
    }

    pub fn subscriber_count(&self) -> usize {
        self.meta_hub.subscriber_count()
    }
}

fn blob_key(name: &str, cid: &str) -> String {
    format!("{name}/{cid}")
}

fn traced<T>(
    method: &'static str,
    begin: Instant,
    result: Result<T, HearthError>,
) -> Result<T, HearthError> {
    match &result {
        Ok(_) => debug!("method={method} took={:?}", begin.elapsed()),
        Err(e) => debug!("method={method} took={:?} err={e}", begin.elapsed()),
    }
    result
}
