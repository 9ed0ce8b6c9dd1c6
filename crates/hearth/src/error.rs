use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum HearthError {
    DataNotFound {
        name: String,
        cid: String,
    },
    MalformedKey {
        key: String,
        reason: String,
    },
    InvalidEnvelope {
        reason: String,
    },
    Storage(StorageError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    NotFound {
        key: String,
    },
    ReadFailed {
        context: String,
        source: Box<StorageErrorSource>,
    },
    WriteFailed {
        context: String,
        source: Box<StorageErrorSource>,
    },
    PermissionDenied {
        context: String,
    },
    DataCorruption {
        context: String,
        details: String,
    },
    InvalidKey {
        key: String,
        reason: String,
    },
    DirectoryLocked {
        context: String,
        pid: Option<u32>,
    },
    LockAcquisitionFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StorageErrorSource {
    Io(String),
    Serialization(String),
}

impl fmt::Display for HearthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HearthError::DataNotFound { name, cid } => {
                write!(f, "Data '{cid}' not found for database '{name}'")
            }
            HearthError::MalformedKey { key, reason } => {
                write!(f, "Malformed key '{key}': {reason}")
            }
            HearthError::InvalidEnvelope { reason } => {
                write!(f, "Invalid metadata envelope: {reason}")
            }
            HearthError::Storage(err) => write!(f, "Storage error: {err}"),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound { key } => write!(f, "Key '{key}' not found"),
            StorageError::ReadFailed { context, source } => {
                write!(f, "Read failed in {context}: {source}")
            }
            StorageError::WriteFailed { context, source } => {
                write!(f, "Write failed in {context}: {source}")
            }
            StorageError::PermissionDenied { context } => {
                write!(f, "Permission denied in {context}")
            }
            StorageError::DataCorruption { context, details } => {
                write!(f, "Data corruption in {context}: {details}")
            }
            StorageError::InvalidKey { key, reason } => {
                write!(f, "Invalid storage key '{key}': {reason}")
            }
            StorageError::DirectoryLocked { context, pid } => match pid {
                Some(pid) => write!(f, "Directory locked in {context} (PID: {pid})"),
                None => write!(f, "Directory locked in {context}"),
            },
            StorageError::LockAcquisitionFailed => {
                write!(f, "Failed to acquire exclusive lock on file")
            }
        }
    }
}

impl fmt::Display for StorageErrorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageErrorSource::Io(msg) => write!(f, "IO error: {msg}"),
            StorageErrorSource::Serialization(msg) => write!(f, "Serialization error: {msg}"),
        }
    }
}

impl std::error::Error for HearthError {}
impl std::error::Error for StorageError {}
impl std::error::Error for StorageErrorSource {}

impl HearthError {
    pub fn is_not_found(&self) -> bool {
        match self {
            HearthError::DataNotFound { .. } => true,
            HearthError::Storage(err) => err.is_not_found(),
            _ => false,
        }
    }

    /// Errors the caller can fix by changing the request; everything else is
    /// a server-side failure.
    pub fn is_client_error(&self) -> bool {
        match self {
            HearthError::DataNotFound { .. }
            | HearthError::MalformedKey { .. }
            | HearthError::InvalidEnvelope { .. } => true,
            HearthError::Storage(err) => {
                matches!(
                    err,
                    StorageError::NotFound { .. } | StorageError::InvalidKey { .. }
                )
            }
        }
    }
}

impl From<StorageError> for HearthError {
    fn from(err: StorageError) -> Self {
        HearthError::Storage(err)
    }
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }

    /// Map an I/O error raised while writing. A missing path here is a
    /// failed write, not an absent key; key lookups build `NotFound` themselves.
    pub fn from_io_error(e: std::io::Error, context: &str) -> Self {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => StorageError::PermissionDenied {
                context: context.to_string(),
            },
            _ => StorageError::WriteFailed {
                context: context.to_string(),
                source: Box::new(StorageErrorSource::Io(e.to_string())),
            },
        }
    }

    /// Map an I/O error raised while reading.
    pub fn from_read_error(e: std::io::Error, context: &str) -> Self {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => Self::from_io_error(e, context),
            _ => StorageError::ReadFailed {
                context: context.to_string(),
                source: Box::new(StorageErrorSource::Io(e.to_string())),
            },
        }
    }

    pub fn from_serialization_error(e: impl std::fmt::Display, context: &str) -> Self {
        StorageError::DataCorruption {
            context: context.to_string(),
            details: e.to_string(),
        }
    }
}
