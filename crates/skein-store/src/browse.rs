//! Read-only view of a blob store as a flat directory.
//!
//! A filesystem front end mounts a [`BlobDir`]: each stored blob appears as
//! a file named by its reference. Listing is disabled, since it would mean
//! enumerating the entire store; names can only be looked up directly.

use std::sync::Arc;

use skein_types::BlobRef;
use tokio::io::AsyncReadExt;
use tracing::trace;

use crate::error::StoreResult;
use crate::traits::BlobStorage;

/// Directory mode: read and traverse for the owner.
pub const DIR_MODE: u32 = 0o500;
/// File mode: read for the owner.
pub const FILE_MODE: u32 = 0o400;

/// Attributes reported for a directory entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeAttr {
    pub size: u64,
    pub mode: u32,
    pub is_dir: bool,
}

/// The blob directory.
#[derive(Clone)]
pub struct BlobDir {
    storage: Arc<dyn BlobStorage>,
}

impl BlobDir {
    pub fn new(storage: Arc<dyn BlobStorage>) -> Self {
        Self { storage }
    }

    pub fn attr(&self) -> NodeAttr {
        NodeAttr {
            size: 0,
            mode: DIR_MODE,
            is_dir: true,
        }
    }

    /// Always empty.
    pub fn read_dir(&self) -> Vec<String> {
        Vec::new()
    }

    /// Resolve `name` to a blob node.
    ///
    /// Names that are not blob references, and references with no stored
    /// blob, resolve to `None`.
    pub async fn lookup(&self, name: &str) -> StoreResult<Option<BlobNode>> {
        let Some(blob) = BlobRef::try_parse(name) else {
            trace!(name, "lookup of non-reference name");
            return Ok(None);
        };
        let Some(object) = self.storage.get(&blob).await? else {
            return Ok(None);
        };
        Ok(Some(BlobNode {
            blob,
            size: object.size,
            storage: self.storage.clone(),
        }))
    }
}

/// A single blob exposed as a read-only file.
#[derive(Clone)]
pub struct BlobNode {
    blob: BlobRef,
    size: u64,
    storage: Arc<dyn BlobStorage>,
}

impl BlobNode {
    pub fn blob(&self) -> &BlobRef {
        &self.blob
    }

    pub fn attr(&self) -> NodeAttr {
        NodeAttr {
            size: self.size,
            mode: FILE_MODE,
            is_dir: false,
        }
    }

    /// Read the blob's entire content.
    pub async fn read_all(&self) -> StoreResult<Vec<u8>> {
        let (mut reader, size) = self.storage.fetch(&self.blob).await?;
        let mut buf = Vec::with_capacity(size as usize);
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }
}

impl std::fmt::Debug for BlobNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobNode")
            .field("blob", &self.blob)
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use skein_remote::InMemoryRemote;
    use skein_types::ShardPath;

    use crate::config::StoreConfig;
    use crate::mapper::BlobMapper;

    const SHA1_A: &str = "sha1-aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    async fn dir_with_blob(content: &'static [u8]) -> (Arc<InMemoryRemote>, BlobDir) {
        let remote = Arc::new(InMemoryRemote::new("root"));
        let mapper = BlobMapper::new(remote.clone(), StoreConfig::new("root")).unwrap();
        mapper
            .put_bytes(
                &BlobRef::parse(SHA1_A).unwrap(),
                &"aa".parse::<ShardPath>().unwrap(),
                Bytes::from_static(content),
            )
            .await
            .unwrap();
        (remote, BlobDir::new(Arc::new(mapper)))
    }

    #[tokio::test]
    async fn lookup_finds_stored_blob() {
        let (_remote, dir) = dir_with_blob(b"hello").await;
        let node = dir.lookup(SHA1_A).await.unwrap().expect("present");
        assert_eq!(node.blob().to_string(), SHA1_A);
        assert_eq!(
            node.attr(),
            NodeAttr {
                size: 5,
                mode: 0o400,
                is_dir: false
            }
        );
        assert_eq!(node.read_all().await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn lookup_of_garbage_name_is_none() {
        let (remote, dir) = dir_with_blob(b"x").await;
        let queries = remote.stats().queries;
        assert!(dir.lookup("not-a-ref").await.unwrap().is_none());
        assert!(dir.lookup(".DS_Store").await.unwrap().is_none());
        assert_eq!(remote.stats().queries, queries, "no remote call for bad names");
    }

    #[tokio::test]
    async fn lookup_of_missing_blob_is_none() {
        let (_remote, dir) = dir_with_blob(b"x").await;
        let other = "sha1-bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
        assert!(dir.lookup(other).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn browsing_never_writes() {
        let (remote, dir) = dir_with_blob(b"x").await;
        let writes = remote.stats().writes();
        assert!(dir.read_dir().is_empty());
        let node = dir.lookup(SHA1_A).await.unwrap().unwrap();
        node.read_all().await.unwrap();
        assert_eq!(remote.stats().writes(), writes);
    }

    #[test]
    fn dir_attr_is_read_only_directory() {
        let dir = BlobDir::new(Arc::new(
            BlobMapper::new(Arc::new(InMemoryRemote::new("root")), StoreConfig::new("root"))
                .unwrap(),
        ));
        let attr = dir.attr();
        assert!(attr.is_dir);
        assert_eq!(attr.mode, DIR_MODE);
    }
}
