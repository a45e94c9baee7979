use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid blob reference {input:?}: {reason}")]
    InvalidBlobRef { input: String, reason: String },

    #[error("unknown hash function: {0}")]
    UnknownHash(String),

    #[error("invalid shard segment {segment:?}: {reason}")]
    InvalidShardSegment { segment: String, reason: String },

    #[error("invalid shard scheme: {0}")]
    InvalidShardScheme(String),
}

/// Result alias for type operations.
pub type TypeResult<T> = Result<T, TypeError>;
