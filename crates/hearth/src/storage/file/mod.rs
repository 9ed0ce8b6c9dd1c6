pub mod blob_store;
pub mod common;
pub mod meta_store;

pub use blob_store::FileBlobStore;
pub use common::SyncMode;
pub use meta_store::FileMetaStore;
