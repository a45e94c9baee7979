use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::error::RemoteResult;
use crate::object::{ObjectSpec, RemoteObject};
use crate::query::{Query, QueryPage};

/// Byte stream of downloaded content.
pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

/// Client for a remote folder-tree object service.
///
/// Implementations must be safe to share between concurrent callers. The
/// service offers no compare-and-swap: every call stands alone, and search
/// results may lag behind writes.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Search for objects matching `query`.
    ///
    /// Returns at most `max_results` items (the service default when `None`).
    /// Pass the previous page's `next_page_token` to continue.
    async fn query(
        &self,
        query: &Query,
        page_token: Option<&str>,
        max_results: Option<usize>,
    ) -> RemoteResult<QueryPage>;

    /// Create an object, optionally uploading `media` as its content.
    async fn insert(&self, spec: &ObjectSpec, media: Option<Bytes>) -> RemoteResult<RemoteObject>;

    /// Update an object's metadata and, when `media` is given, replace its
    /// content.
    async fn update(
        &self,
        id: &str,
        spec: &ObjectSpec,
        media: Option<Bytes>,
    ) -> RemoteResult<RemoteObject>;

    /// Move an object to the trash.
    async fn trash(&self, id: &str) -> RemoteResult<RemoteObject>;

    /// Open the content behind a download URL.
    async fn download(&self, url: &str) -> RemoteResult<BlobReader>;
}
