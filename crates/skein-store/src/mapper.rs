//! The blob mapper: content-addressed operations over remote objects.
//!
//! A blob is a remote object whose title is its reference string. It is
//! filed under two parents: its shard folder, which keeps folder fan-out
//! bounded, and the store root, which lets point lookups and enumeration
//! query a single folder instead of descending the shard tree.
//!
//! # Put protocol
//!
//! 1. Look the reference up under the root.
//! 2. Found: upload the content as a replacement. The update is always sent;
//!    the remote is not assumed to deduplicate.
//! 3. Missing: materialize the shard folders, record the shard in the
//!    registration index, then insert the blob under root and shard folder.
//!
//! Concurrent puts of one reference inside this process are collapsed into a
//! single remote write. Two processes putting the same new reference can
//! still both insert, leaving two objects with the same title; lookups then
//! return whichever the remote lists first. Content is never corrupted by
//! this, since both objects hold the same bytes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use skein_remote::{BlobReader, ObjectSpec, RemoteClient, RemoteObject, BLOB_MIME_TYPE};
use skein_types::{BlobRef, ShardPath, SizedRef};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::enumerate::{EnumeratePage, Enumerator, MAX_ENUMERATE};
use crate::error::{StoreError, StoreResult};
use crate::flight::SingleFlight;
use crate::handle::RemoteHandle;
use crate::registry::RegistrationIndex;
use crate::sharder::Sharder;
use crate::traits::BlobStorage;

/// Content-addressed blob store over a remote folder tree.
pub struct BlobMapper {
    config: StoreConfig,
    remote: RemoteHandle,
    sharder: Sharder,
    registry: RegistrationIndex,
    enumerator: Enumerator,
    puts: SingleFlight<BlobRef, StoreResult<RemoteObject>>,
}

impl BlobMapper {
    /// Create a mapper rooted at `config.root_id`.
    pub fn new(client: Arc<dyn RemoteClient>, config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let remote = RemoteHandle::new(client, &config.root_id, config.op_timeout());
        Ok(Self {
            sharder: Sharder::new(remote.clone()),
            registry: RegistrationIndex::new(remote.clone()),
            enumerator: Enumerator::new(remote.clone(), config.enumerate_page_size),
            puts: SingleFlight::new(),
            remote,
            config,
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn sharder(&self) -> &Sharder {
        &self.sharder
    }

    pub fn registry(&self) -> &RegistrationIndex {
        &self.registry
    }

    /// Shard path the configured scheme assigns to `blob`.
    pub fn shard_path_for(&self, blob: &BlobRef) -> ShardPath {
        self.config.shard.path_for(blob)
    }

    /// Store the content read from `content` as `blob`.
    pub async fn put<R>(
        &self,
        blob: &BlobRef,
        shard: &ShardPath,
        mut content: R,
    ) -> StoreResult<RemoteObject>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut buf = Vec::new();
        content.read_to_end(&mut buf).await?;
        self.put_bytes(blob, shard, Bytes::from(buf)).await
    }

    /// Store `content` as `blob`.
    ///
    /// When a put of `blob` is already in flight in this process, waits for
    /// it and returns its result instead of writing again.
    pub async fn put_bytes(
        &self,
        blob: &BlobRef,
        shard: &ShardPath,
        content: Bytes,
    ) -> StoreResult<RemoteObject> {
        self.puts
            .run(blob.clone(), || self.upsert(blob, shard, content))
            .await
    }

    async fn upsert(
        &self,
        blob: &BlobRef,
        shard: &ShardPath,
        content: Bytes,
    ) -> StoreResult<RemoteObject> {
        if let Some(existing) = self.get(blob).await? {
            debug!(blob = %blob, id = %existing.id, size = content.len(), "replacing blob content");
            return self
                .remote
                .update(&existing.id, &ObjectSpec::default(), Some(content))
                .await;
        }

        let folder = self.sharder.ensure_path(shard).await?;
        if let Some(top) = shard.top() {
            self.registry.record_shard(top, &shard.sub()).await?;
        }

        let spec = ObjectSpec::new(blob.to_string())
            .with_mime_type(BLOB_MIME_TYPE)
            .with_parent(self.remote.root_id())
            .with_parent(folder.id.as_str());
        let created = self.remote.insert(&spec, Some(content)).await?;
        info!(blob = %blob, id = %created.id, shard = %shard, size = created.size, "stored blob");
        Ok(created)
    }

    /// Look up the object holding `blob`. Trashed objects are not returned,
    /// nor are folders or registration entries that share the title.
    pub async fn get(&self, blob: &BlobRef) -> StoreResult<Option<RemoteObject>> {
        let query = self
            .remote
            .root_children()
            .titled(blob.to_string())
            .with_mime_type(BLOB_MIME_TYPE);
        self.remote.find_one(&query).await
    }

    /// Size of `blob`, or 0 when it is not stored.
    pub async fn stat(&self, blob: &BlobRef) -> StoreResult<u64> {
        Ok(self.get(blob).await?.map_or(0, |object| object.size))
    }

    /// Open `blob` for reading.
    ///
    /// Fails with [`StoreError::NotFound`] when the blob is not stored and
    /// with [`StoreError::NotUploaded`] when its object has no download URL.
    pub async fn fetch(&self, blob: &BlobRef) -> StoreResult<(BlobReader, u64)> {
        let object = self
            .get(blob)
            .await?
            .ok_or_else(|| StoreError::NotFound(blob.clone()))?;
        let Some(url) = object.download_url.as_deref() else {
            warn!(blob = %blob, id = %object.id, "blob object has no uploaded content");
            return Err(StoreError::NotUploaded(blob.clone()));
        };
        let reader = self.remote.download(url).await?;
        Ok((reader, object.size))
    }

    /// Move `blob` to the trash. Succeeds when it is already absent.
    pub async fn remove(&self, blob: &BlobRef) -> StoreResult<()> {
        match self.get(blob).await? {
            Some(object) => {
                self.remote.trash(&object.id).await?;
                info!(blob = %blob, id = %object.id, "trashed blob");
            }
            None => debug!(blob = %blob, "remove of absent blob"),
        }
        Ok(())
    }

    /// One page of stored blobs.
    pub async fn enumerate(&self, after: Option<&str>, limit: usize) -> StoreResult<EnumeratePage> {
        self.enumerator.page(after, limit).await
    }

    /// Stream stored blobs into `dest`, giving up once `wait` elapses.
    ///
    /// On timeout the items already sent remain valid, but no resume cursor
    /// is returned for them. Callers that must resume after a deadline
    /// should page with [`BlobMapper::enumerate`] instead, which hands back
    /// a cursor after every page.
    pub async fn enumerate_blobs(
        &self,
        dest: mpsc::Sender<SizedRef>,
        after: Option<String>,
        limit: usize,
        wait: Duration,
    ) -> StoreResult<Option<String>> {
        tokio::time::timeout(wait, self.enumerator.stream(dest, after, limit))
            .await
            .map_err(|_| StoreError::Timeout {
                op: "enumerate".into(),
                after: wait,
            })?
    }

    /// Shard paths recorded in the registration index.
    pub async fn list_registrations(
        &self,
        page_token: Option<&str>,
        limit: usize,
    ) -> StoreResult<(Vec<String>, Option<String>)> {
        self.registry.list_registrations(page_token, limit).await
    }

    pub fn max_enumerate(&self) -> usize {
        MAX_ENUMERATE
    }
}

#[async_trait]
impl BlobStorage for BlobMapper {
    async fn put(
        &self,
        blob: &BlobRef,
        shard: &ShardPath,
        content: BlobReader,
    ) -> StoreResult<RemoteObject> {
        BlobMapper::put(self, blob, shard, content).await
    }

    async fn get(&self, blob: &BlobRef) -> StoreResult<Option<RemoteObject>> {
        BlobMapper::get(self, blob).await
    }

    async fn stat(&self, blob: &BlobRef) -> StoreResult<u64> {
        BlobMapper::stat(self, blob).await
    }

    async fn fetch(&self, blob: &BlobRef) -> StoreResult<(BlobReader, u64)> {
        BlobMapper::fetch(self, blob).await
    }

    async fn remove(&self, blob: &BlobRef) -> StoreResult<()> {
        BlobMapper::remove(self, blob).await
    }

    async fn enumerate_blobs(
        &self,
        dest: mpsc::Sender<SizedRef>,
        after: Option<String>,
        limit: usize,
        wait: Duration,
    ) -> StoreResult<Option<String>> {
        BlobMapper::enumerate_blobs(self, dest, after, limit, wait).await
    }

    fn max_enumerate(&self) -> usize {
        MAX_ENUMERATE
    }
}
