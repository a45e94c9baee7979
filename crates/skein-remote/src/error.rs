use std::fmt;

use thiserror::Error;

/// The remote call that produced an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    Query,
    Insert,
    Update,
    Trash,
    Download,
}

impl fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RemoteOp::Query => "query",
            RemoteOp::Insert => "insert",
            RemoteOp::Update => "update",
            RemoteOp::Trash => "trash",
            RemoteOp::Download => "download",
        };
        f.write_str(name)
    }
}

/// Errors returned by a remote client.
///
/// Errors carry rendered messages rather than source errors so that one
/// result can be cloned out to every caller waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// No object with this ID (or download URL) exists.
    #[error("remote object not found: {0}")]
    NotFound(String),

    /// The service refused the request.
    #[error("{op} rejected: {reason}")]
    Rejected { op: RemoteOp, reason: String },

    /// Network or API failure.
    #[error("{op} failed: {message}")]
    Transport { op: RemoteOp, message: String },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for RemoteError {
    fn from(e: std::io::Error) -> Self {
        RemoteError::Io(e.to_string())
    }
}

impl From<bincode::Error> for RemoteError {
    fn from(e: bincode::Error) -> Self {
        RemoteError::Serialization(e.to_string())
    }
}

/// Result alias for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;
