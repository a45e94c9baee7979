use std::time::Duration;

use async_trait::async_trait;
use skein_remote::{BlobReader, RemoteObject};
use skein_types::{BlobRef, ShardPath, SizedRef};
use tokio::sync::mpsc;

use crate::error::StoreResult;

/// Blob storage keyed by content-hash references.
///
/// All implementations must satisfy these invariants:
/// - Absence is a value, not an error: `get` returns `Ok(None)` and `stat`
///   returns `Ok(0)` for a blob that was never stored. Only `fetch` reports
///   a missing blob as an error.
/// - `remove` is idempotent.
/// - `enumerate_blobs` yields only well-formed references and never more than
///   [`BlobStorage::max_enumerate`] per call.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Store `content` as `blob`, filed under `shard`.
    async fn put(
        &self,
        blob: &BlobRef,
        shard: &ShardPath,
        content: BlobReader,
    ) -> StoreResult<RemoteObject>;

    /// Look up the remote object holding `blob`.
    async fn get(&self, blob: &BlobRef) -> StoreResult<Option<RemoteObject>>;

    /// Stored size of `blob`, or 0 when absent.
    async fn stat(&self, blob: &BlobRef) -> StoreResult<u64>;

    /// Open `blob`'s content. Returns the stream and the content size.
    async fn fetch(&self, blob: &BlobRef) -> StoreResult<(BlobReader, u64)>;

    /// Trash `blob` if it exists.
    async fn remove(&self, blob: &BlobRef) -> StoreResult<()>;

    /// Send up to `limit` stored blobs into `dest`, resuming at `after`.
    ///
    /// `dest` is closed when this returns. The walk is abandoned with a
    /// timeout error once `wait` elapses; items sent before that stay valid,
    /// but their resume cursor is lost. Returns the resume cursor.
    async fn enumerate_blobs(
        &self,
        dest: mpsc::Sender<SizedRef>,
        after: Option<String>,
        limit: usize,
        wait: Duration,
    ) -> StoreResult<Option<String>>;

    /// Upper bound on `limit` honored by [`BlobStorage::enumerate_blobs`].
    fn max_enumerate(&self) -> usize;
}
