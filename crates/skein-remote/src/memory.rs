//! In-memory remote folder tree.
//!
//! [`InMemoryRemote`] implements [`RemoteClient`] over a `BTreeMap` behind a
//! `RwLock`. It models the parts of a hosted folder-tree service Skein relies
//! on: opaque IDs, multi-parent filing, trash, paged queries, and download
//! URLs. It also counts calls and can inject failures, which makes it the
//! test double for the store. The whole tree can be saved to and loaded from
//! a bincode snapshot file, which the CLI uses as a local remote.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::ops::Bound;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{RemoteError, RemoteOp, RemoteResult};
use crate::object::{ObjectSpec, RemoteObject, BLOB_MIME_TYPE, FOLDER_MIME_TYPE};
use crate::query::{Query, QueryPage, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::traits::{BlobReader, RemoteClient};

const URL_SCHEME: &str = "mem://";

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredEntry {
    object: RemoteObject,
    content: Option<Vec<u8>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RemoteState {
    next_id: u64,
    objects: BTreeMap<String, StoredEntry>,
}

impl RemoteState {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        // Zero-padded so map order is creation order.
        format!("obj-{:010}", self.next_id)
    }

    fn ensure_folder(&mut self, id: &str) {
        self.objects.entry(id.to_string()).or_insert_with(|| StoredEntry {
            object: RemoteObject {
                id: id.to_string(),
                title: id.to_string(),
                mime_type: FOLDER_MIME_TYPE.to_string(),
                parents: Vec::new(),
                size: 0,
                download_url: None,
                description: String::new(),
                trashed: false,
            },
            content: None,
        });
    }

    fn check_parents(&self, op: RemoteOp, parents: &[String]) -> RemoteResult<()> {
        for parent in parents {
            match self.objects.get(parent) {
                Some(entry) if entry.object.is_folder() => {}
                Some(_) => {
                    return Err(RemoteError::Rejected {
                        op,
                        reason: format!("parent {parent} is not a folder"),
                    })
                }
                None => {
                    return Err(RemoteError::Rejected {
                        op,
                        reason: format!("parent {parent} does not exist"),
                    })
                }
            }
        }
        Ok(())
    }
}

/// Snapshot of the calls an [`InMemoryRemote`] has served.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RemoteStats {
    pub queries: u64,
    pub inserts: u64,
    pub updates: u64,
    pub trashes: u64,
    pub downloads: u64,
}

impl RemoteStats {
    /// Calls that mutate remote state.
    pub fn writes(&self) -> u64 {
        self.inserts + self.updates + self.trashes
    }
}

#[derive(Debug, Default)]
struct Counters {
    queries: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
    trashes: AtomicU64,
    downloads: AtomicU64,
}

impl Counters {
    fn bump(&self, op: RemoteOp) {
        let counter = match op {
            RemoteOp::Query => &self.queries,
            RemoteOp::Insert => &self.inserts,
            RemoteOp::Update => &self.updates,
            RemoteOp::Trash => &self.trashes,
            RemoteOp::Download => &self.downloads,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// An in-memory implementation of [`RemoteClient`].
#[derive(Debug)]
pub struct InMemoryRemote {
    root_id: String,
    state: RwLock<RemoteState>,
    faults: Mutex<Vec<(RemoteOp, u32)>>,
    latency: Option<Duration>,
    counters: Counters,
}

impl InMemoryRemote {
    /// Create an empty tree containing only the folder `root_id`.
    pub fn new(root_id: impl Into<String>) -> Self {
        let root_id = root_id.into();
        let mut state = RemoteState::default();
        state.ensure_folder(&root_id);
        Self::from_state(root_id, state)
    }

    fn from_state(root_id: String, state: RemoteState) -> Self {
        Self {
            root_id,
            state: RwLock::new(state),
            faults: Mutex::new(Vec::new()),
            latency: None,
            counters: Counters::default(),
        }
    }

    /// Delay every call by `latency`, widening race windows in tests.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Load a tree saved with [`InMemoryRemote::save`].
    ///
    /// The folder `root_id` is created if the snapshot lacks it.
    pub fn load(path: &Path, root_id: impl Into<String>) -> RemoteResult<Self> {
        let root_id = root_id.into();
        let data = std::fs::read(path)?;
        let mut state: RemoteState = bincode::deserialize(&data)?;
        state.ensure_folder(&root_id);
        tracing::debug!(path = %path.display(), objects = state.objects.len(), "loaded remote snapshot");
        Ok(Self::from_state(root_id, state))
    }

    /// Load `path` if it exists, otherwise start an empty tree.
    pub fn open_or_create(path: &Path, root_id: impl Into<String>) -> RemoteResult<Self> {
        if path.exists() {
            Self::load(path, root_id)
        } else {
            Ok(Self::new(root_id))
        }
    }

    /// Write the whole tree to `path` as a bincode snapshot.
    ///
    /// The snapshot is written to a sibling temp file and renamed into
    /// place, so a crash never leaves a truncated snapshot behind.
    pub fn save(&self, path: &Path) -> RemoteResult<()> {
        let data = {
            let state = self.read_state()?;
            bincode::serialize(&*state)?
        };
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &data)?;
        std::fs::rename(&tmp, path)?;
        tracing::debug!(path = %path.display(), bytes = data.len(), "saved remote snapshot");
        Ok(())
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// Make the next call of kind `op` fail with a transport error.
    pub fn fail_next(&self, op: RemoteOp) {
        self.fail_after(op, 0);
    }

    /// Let `skip` calls of kind `op` succeed, then fail the one after.
    pub fn fail_after(&self, op: RemoteOp, skip: u32) {
        self.faults.lock().expect("lock poisoned").push((op, skip));
    }

    /// Calls served so far.
    pub fn stats(&self) -> RemoteStats {
        RemoteStats {
            queries: self.counters.queries.load(Ordering::Relaxed),
            inserts: self.counters.inserts.load(Ordering::Relaxed),
            updates: self.counters.updates.load(Ordering::Relaxed),
            trashes: self.counters.trashes.load(Ordering::Relaxed),
            downloads: self.counters.downloads.load(Ordering::Relaxed),
        }
    }

    /// Look up an object by ID, trashed or not.
    pub fn object(&self, id: &str) -> Option<RemoteObject> {
        let state = self.state.read().expect("lock poisoned");
        state.objects.get(id).map(|entry| entry.object.clone())
    }

    /// Every object titled `title`, trashed or not, in creation order.
    pub fn objects_titled(&self, title: &str) -> Vec<RemoteObject> {
        let state = self.state.read().expect("lock poisoned");
        state
            .objects
            .values()
            .filter(|entry| entry.object.title == title)
            .map(|entry| entry.object.clone())
            .collect()
    }

    /// Number of objects in the tree, including the root and trashed ones.
    pub fn len(&self) -> usize {
        self.state.read().expect("lock poisoned").objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_state(&self) -> RemoteResult<RwLockReadGuard<'_, RemoteState>> {
        self.state
            .read()
            .map_err(|e| RemoteError::Io(format!("lock poisoned: {e}")))
    }

    fn write_state(&self) -> RemoteResult<RwLockWriteGuard<'_, RemoteState>> {
        self.state
            .write()
            .map_err(|e| RemoteError::Io(format!("lock poisoned: {e}")))
    }

    /// Common prologue of every call: count it, wait, maybe fail.
    async fn begin(&self, op: RemoteOp) -> RemoteResult<()> {
        self.counters.bump(op);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let injected = {
            let mut faults = self
                .faults
                .lock()
                .map_err(|e| RemoteError::Io(format!("lock poisoned: {e}")))?;
            match faults.iter().position(|(f, _)| *f == op) {
                Some(pos) if faults[pos].1 == 0 => {
                    faults.remove(pos);
                    true
                }
                Some(pos) => {
                    faults[pos].1 -= 1;
                    false
                }
                None => false,
            }
        };
        if injected {
            tracing::debug!(%op, "injected remote failure");
            return Err(RemoteError::Transport {
                op,
                message: "injected failure".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteClient for InMemoryRemote {
    async fn query(
        &self,
        query: &Query,
        page_token: Option<&str>,
        max_results: Option<usize>,
    ) -> RemoteResult<QueryPage> {
        self.begin(RemoteOp::Query).await?;
        let limit = max_results.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let lower = match page_token {
            Some(token) if !token.is_empty() => Bound::Excluded(token.to_string()),
            _ => Bound::Unbounded,
        };

        let state = self.read_state()?;
        let mut matching = state
            .objects
            .range((lower, Bound::Unbounded))
            .map(|(_, entry)| &entry.object)
            .filter(|object| query.matches(object));

        let items: Vec<RemoteObject> = matching.by_ref().take(limit).cloned().collect();
        let next_page_token = match (matching.next(), items.last()) {
            (Some(_), Some(last)) => Some(last.id.clone()),
            _ => None,
        };
        Ok(QueryPage {
            items,
            next_page_token,
        })
    }

    async fn insert(&self, spec: &ObjectSpec, media: Option<Bytes>) -> RemoteResult<RemoteObject> {
        self.begin(RemoteOp::Insert).await?;
        let mut state = self.write_state()?;
        state.check_parents(RemoteOp::Insert, &spec.parents)?;

        let id = state.allocate_id();
        let object = RemoteObject {
            id: id.clone(),
            title: spec.title.clone(),
            mime_type: spec
                .mime_type
                .clone()
                .unwrap_or_else(|| BLOB_MIME_TYPE.to_string()),
            parents: spec.parents.clone(),
            size: media.as_ref().map_or(0, |m| m.len() as u64),
            download_url: media.as_ref().map(|_| format!("{URL_SCHEME}{id}")),
            description: spec.description.clone().unwrap_or_default(),
            trashed: false,
        };
        state.objects.insert(
            id,
            StoredEntry {
                object: object.clone(),
                content: media.map(|m| m.to_vec()),
            },
        );
        Ok(object)
    }

    async fn update(
        &self,
        id: &str,
        spec: &ObjectSpec,
        media: Option<Bytes>,
    ) -> RemoteResult<RemoteObject> {
        self.begin(RemoteOp::Update).await?;
        let mut state = self.write_state()?;
        if !spec.parents.is_empty() {
            state.check_parents(RemoteOp::Update, &spec.parents)?;
        }
        let entry = state
            .objects
            .get_mut(id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;

        let object = &mut entry.object;
        if !spec.title.is_empty() {
            object.title = spec.title.clone();
        }
        if let Some(mime_type) = &spec.mime_type {
            object.mime_type = mime_type.clone();
        }
        if let Some(description) = &spec.description {
            object.description = description.clone();
        }
        if !spec.parents.is_empty() {
            object.parents = spec.parents.clone();
        }
        if let Some(media) = media {
            object.size = media.len() as u64;
            object.download_url = Some(format!("{URL_SCHEME}{id}"));
            entry.content = Some(media.to_vec());
        }
        Ok(entry.object.clone())
    }

    async fn trash(&self, id: &str) -> RemoteResult<RemoteObject> {
        self.begin(RemoteOp::Trash).await?;
        let mut state = self.write_state()?;
        let entry = state
            .objects
            .get_mut(id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        entry.object.trashed = true;
        Ok(entry.object.clone())
    }

    async fn download(&self, url: &str) -> RemoteResult<BlobReader> {
        self.begin(RemoteOp::Download).await?;
        let id = url
            .strip_prefix(URL_SCHEME)
            .ok_or_else(|| RemoteError::NotFound(url.to_string()))?;
        let state = self.read_state()?;
        let content = state
            .objects
            .get(id)
            .and_then(|entry| entry.content.clone())
            .ok_or_else(|| RemoteError::NotFound(url.to_string()))?;
        Ok(Box::new(Cursor::new(content)))
    }
}
