use std::time::Duration;

use skein_remote::RemoteError;
use skein_types::{BlobRef, TypeError};

/// Errors from blob store operations.
///
/// `StoreError` is `Clone` so that the result of one single-flighted remote
/// write can be handed to every caller waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// A remote call failed. Surfaced verbatim, never retried here.
    #[error("remote call failed: {0}")]
    Remote(#[from] RemoteError),

    /// No object exists for the blob.
    #[error("blob not found: {0}")]
    NotFound(BlobRef),

    /// The blob's object exists but has no uploaded content.
    #[error("blob {0} has no uploaded content")]
    NotUploaded(BlobRef),

    /// A name failed to parse as a blob reference.
    #[error("invalid blob reference: {0}")]
    InvalidReference(String),

    /// A shard path or shard scheme is malformed.
    #[error("invalid shard path: {0}")]
    InvalidShardPath(String),

    /// A remote call or enumeration exceeded its deadline.
    #[error("{op} timed out after {after:?}")]
    Timeout { op: String, after: Duration },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<TypeError> for StoreError {
    fn from(e: TypeError) -> Self {
        match e {
            TypeError::InvalidBlobRef { .. } | TypeError::UnknownHash(_) => {
                StoreError::InvalidReference(e.to_string())
            }
            TypeError::InvalidShardSegment { .. } | TypeError::InvalidShardScheme(_) => {
                StoreError::InvalidShardPath(e.to_string())
            }
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
