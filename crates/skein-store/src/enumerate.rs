//! Enumeration of stored blobs.
//!
//! Every blob object is filed directly under the store root as well as under
//! its shard folder, so enumeration lists the root's blob-typed children and
//! keeps the ones whose title parses as a [`BlobRef`]. Shard folders and
//! registration entries live there too; the listing excludes them by type.
//!
//! # Cursors
//!
//! A cursor is the remote service's page token. Each listing call asks for
//! exactly the number of items still wanted, so when a page ends the token
//! points just past the last item examined, and resuming from it neither
//! repeats nor skips a blob. Cursors are only meaningful within one
//! enumeration session and carry no ordering guarantee beyond the remote's
//! native listing order.

use skein_remote::{Query, BLOB_MIME_TYPE};
use skein_types::{BlobRef, SizedRef};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::StoreResult;
use crate::handle::RemoteHandle;

/// Largest number of blobs one enumeration call may return.
pub const MAX_ENUMERATE: usize = 1000;

/// One batch of enumerated blobs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnumeratePage {
    pub items: Vec<SizedRef>,
    /// Cursor resuming after the last examined object; `None` when the
    /// listing is exhausted.
    pub next: Option<String>,
}

/// Pages through the blobs filed under the store root.
pub struct Enumerator {
    remote: RemoteHandle,
    page_size: usize,
}

impl Enumerator {
    pub(crate) fn new(remote: RemoteHandle, page_size: usize) -> Self {
        Self {
            remote,
            page_size: page_size.clamp(1, MAX_ENUMERATE),
        }
    }

    fn listing(&self) -> Query {
        self.remote.root_children().with_mime_type(BLOB_MIME_TYPE)
    }

    /// Collect up to `limit` blobs (capped at [`MAX_ENUMERATE`]) starting
    /// at `after`.
    pub async fn page(&self, after: Option<&str>, limit: usize) -> StoreResult<EnumeratePage> {
        let mut remaining = limit.min(MAX_ENUMERATE);
        let mut cursor = after.filter(|c| !c.is_empty()).map(str::to_string);
        let mut items = Vec::with_capacity(remaining);
        let listing = self.listing();

        while remaining > 0 {
            let page = self
                .remote
                .query(
                    &listing,
                    cursor.as_deref(),
                    Some(remaining.min(self.page_size)),
                )
                .await?;

            for object in page.items {
                match BlobRef::try_parse(&object.title) {
                    Some(blob) => {
                        items.push(SizedRef::new(blob, object.size));
                        remaining -= 1;
                    }
                    None => trace!(title = %object.title, "skipping non-blob object"),
                }
            }

            cursor = page.next_page_token;
            if cursor.is_none() {
                break;
            }
        }

        debug!(count = items.len(), more = cursor.is_some(), "enumerated page");
        Ok(EnumeratePage {
            items,
            next: cursor,
        })
    }

    /// Stream up to `limit` blobs into `dest`, one listing call at a time.
    ///
    /// `dest` is dropped, closing the channel, when this returns. Returns the
    /// cursor to resume from, or `None` when the listing is exhausted or the
    /// receiver hung up.
    pub async fn stream(
        &self,
        dest: mpsc::Sender<SizedRef>,
        after: Option<String>,
        limit: usize,
    ) -> StoreResult<Option<String>> {
        let mut remaining = limit.min(MAX_ENUMERATE);
        let mut cursor = after;

        while remaining > 0 {
            let page = self
                .page(cursor.as_deref(), remaining.min(self.page_size))
                .await?;
            remaining -= page.items.len();
            for item in page.items {
                if dest.send(item).await.is_err() {
                    debug!("enumeration receiver dropped");
                    return Ok(None);
                }
            }
            cursor = page.next;
            if cursor.is_none() {
                break;
            }
        }
        Ok(cursor)
    }
}
