//! Content-addressed blob storage over a remote folder tree.
//!
//! Blobs are immutable byte sequences named by a content-hash reference. This
//! crate maps each reference to one object in a hosted folder tree reached
//! through [`skein_remote::RemoteClient`], and keeps that tree navigable:
//! blobs are spread over shard folders, every shard that exists is recorded
//! in a registration index, and all blobs can be enumerated in pages.
//!
//! # Key Types
//!
//! - [`BlobMapper`] -- put, get, stat, fetch, remove, and enumerate
//! - [`BlobStorage`] -- The storage trait the mapper implements
//! - [`Sharder`] -- Idempotent creation of shard folder chains
//! - [`RegistrationIndex`] -- Which shard folders exist
//! - [`Enumerator`] -- Cursor-based paging over stored blobs
//! - [`BlobDir`] -- Read-only directory view for filesystem front ends
//! - [`StoreConfig`] -- Root folder, shard scheme, and timeouts
//!
//! # Remote layout
//!
//! ```text
//! <root>/
//!   sha1-ab12…          blob (also filed under ab/12/)
//!   ab/                 shard folder
//!     12/               shard folder
//!   ab                  registration entry, description "12;"
//! ```

pub mod browse;
pub mod config;
pub mod enumerate;
pub mod error;
pub mod flight;
mod handle;
pub mod mapper;
pub mod registry;
pub mod sharder;
pub mod traits;

pub use browse::{BlobDir, BlobNode, NodeAttr};
pub use config::StoreConfig;
pub use enumerate::{EnumeratePage, Enumerator, MAX_ENUMERATE};
pub use error::{StoreError, StoreResult};
pub use flight::{NameLocks, SingleFlight};
pub use mapper::BlobMapper;
pub use registry::{RegistrationIndex, ShardSet};
pub use sharder::Sharder;
pub use traits::BlobStorage;
