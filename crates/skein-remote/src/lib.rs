//! Remote folder-tree client interface for Skein.
//!
//! Skein's durable medium is a hierarchical object service: objects are
//! keyed by opaque IDs, filed under parent folders, found by query, and
//! trashed rather than deleted. This crate describes that service as the
//! [`RemoteClient`] trait and the value types that cross it.
//!
//! # Modules
//!
//! - [`error`] -- [`RemoteError`] and the [`RemoteResult`] alias
//! - [`object`] -- [`RemoteObject`], [`ObjectSpec`], and MIME constants
//! - [`query`] -- [`Query`] predicates and [`QueryPage`] results
//! - [`traits`] -- The [`RemoteClient`] trait
//! - [`memory`] -- [`InMemoryRemote`], for tests, embedding, and local use
//!
//! Authentication and token refresh belong to the concrete transport behind
//! a [`RemoteClient`]; nothing in this crate knows about credentials.

pub mod error;
pub mod memory;
pub mod object;
pub mod query;
pub mod traits;

pub use error::{RemoteError, RemoteOp, RemoteResult};
pub use memory::{InMemoryRemote, RemoteStats};
pub use object::{ObjectSpec, RemoteObject, BLOB_MIME_TYPE, FOLDER_MIME_TYPE, METADATA_MIME_TYPE};
pub use query::{Query, QueryPage, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use traits::{BlobReader, RemoteClient};
