//! Foundation types for Skein.
//!
//! Skein stores content-addressed blobs in a remote folder tree. This crate
//! holds the identity types every other Skein crate speaks in.
//!
//! # Key Types
//!
//! - [`BlobRef`] -- Validated content-hash reference (`sha1-…`, `blake3-…`)
//! - [`HashKind`] -- The hash function a reference was computed with
//! - [`SizedRef`] -- A reference annotated with its stored size
//! - [`ShardPath`] -- Folder segments that bound remote folder fan-out
//! - [`ShardScheme`] -- Derives a [`ShardPath`] from a reference

pub mod blobref;
pub mod error;
pub mod shard;

pub use blobref::{BlobRef, HashKind, SizedRef};
pub use error::{TypeError, TypeResult};
pub use shard::{ShardPath, ShardScheme};
