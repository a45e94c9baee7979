//! Shared access to the remote client.
//!
//! Every component of the store reaches the remote service through a
//! [`RemoteHandle`], which scopes calls to the store root and applies the
//! configured per-call deadline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use skein_remote::{
    BlobReader, ObjectSpec, Query, QueryPage, RemoteClient, RemoteObject, RemoteResult,
    FOLDER_MIME_TYPE,
};

use crate::error::{StoreError, StoreResult};

#[derive(Clone)]
pub(crate) struct RemoteHandle {
    client: Arc<dyn RemoteClient>,
    root_id: Arc<str>,
    op_timeout: Option<Duration>,
}

impl RemoteHandle {
    pub(crate) fn new(
        client: Arc<dyn RemoteClient>,
        root_id: &str,
        op_timeout: Option<Duration>,
    ) -> Self {
        Self {
            client,
            root_id: Arc::from(root_id),
            op_timeout,
        }
    }

    pub(crate) fn root_id(&self) -> &str {
        &self.root_id
    }

    /// The store root as a folder object. The root is never fetched; only
    /// its ID matters to callers.
    pub(crate) fn root_folder(&self) -> RemoteObject {
        RemoteObject {
            id: self.root_id.to_string(),
            title: self.root_id.to_string(),
            mime_type: FOLDER_MIME_TYPE.to_string(),
            parents: Vec::new(),
            size: 0,
            download_url: None,
            description: String::new(),
            trashed: false,
        }
    }

    /// Children of the store root.
    pub(crate) fn root_children(&self) -> Query {
        Query::children_of(self.root_id.as_ref())
    }

    async fn call<T>(
        &self,
        op: &str,
        fut: impl Future<Output = RemoteResult<T>>,
    ) -> StoreResult<T> {
        match self.op_timeout {
            Some(after) => match tokio::time::timeout(after, fut).await {
                Ok(result) => Ok(result?),
                Err(_) => Err(StoreError::Timeout {
                    op: op.to_string(),
                    after,
                }),
            },
            None => Ok(fut.await?),
        }
    }

    pub(crate) async fn query(
        &self,
        query: &Query,
        page_token: Option<&str>,
        max_results: Option<usize>,
    ) -> StoreResult<QueryPage> {
        self.call("query", self.client.query(query, page_token, max_results))
            .await
    }

    /// First object matching `query`, if any.
    pub(crate) async fn find_one(&self, query: &Query) -> StoreResult<Option<RemoteObject>> {
        let page = self.query(query, None, Some(1)).await?;
        Ok(page.items.into_iter().next())
    }

    pub(crate) async fn insert(
        &self,
        spec: &ObjectSpec,
        media: Option<Bytes>,
    ) -> StoreResult<RemoteObject> {
        self.call("insert", self.client.insert(spec, media)).await
    }

    pub(crate) async fn update(
        &self,
        id: &str,
        spec: &ObjectSpec,
        media: Option<Bytes>,
    ) -> StoreResult<RemoteObject> {
        self.call("update", self.client.update(id, spec, media))
            .await
    }

    pub(crate) async fn trash(&self, id: &str) -> StoreResult<RemoteObject> {
        self.call("trash", self.client.trash(id)).await
    }

    pub(crate) async fn download(&self, url: &str) -> StoreResult<BlobReader> {
        self.call("download", self.client.download(url)).await
    }
}
