//! Registration index: which shard folders exist.
//!
//! One metadata object per top-level shard name lives directly under the
//! store root. Its description holds the set of sub-shard names created
//! beneath that name, encoded as `a;b;c;`. Entries are created lazily,
//! appended to, and never removed.
//!
//! Updates are read-modify-write on the description and the remote offers
//! no conditional write. Inside one process, updates to the same entry are
//! serialized by [`NameLocks`]. Across processes the last writer wins and a
//! registration can be lost; the shard folders themselves are unaffected.

use skein_remote::{ObjectSpec, Query, RemoteObject, METADATA_MIME_TYPE};
use tracing::{debug, info};

use crate::error::StoreResult;
use crate::flight::NameLocks;
use crate::handle::RemoteHandle;

const DELIMITER: char = ';';

/// Set of sub-shard names decoded from an index entry's description.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShardSet {
    names: Vec<String>,
}

impl ShardSet {
    /// Decode a `a;b;c;` payload. Empty and repeated names are dropped.
    pub fn parse(payload: &str) -> Self {
        let mut set = Self::default();
        for name in payload.split(DELIMITER) {
            set.insert(name);
        }
        set
    }

    /// Add `name`. Returns `false` if it was already present or empty.
    pub fn insert(&mut self, name: &str) -> bool {
        if name.is_empty() || self.contains(name) {
            return false;
        }
        self.names.push(name.to_string());
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Encode as `a;b;c;`.
    pub fn encode(&self) -> String {
        self.names
            .iter()
            .map(|name| format!("{name}{DELIMITER}"))
            .collect()
    }
}

/// The registration index for one store root.
pub struct RegistrationIndex {
    remote: RemoteHandle,
    locks: NameLocks,
}

impl RegistrationIndex {
    pub(crate) fn new(remote: RemoteHandle) -> Self {
        Self {
            remote,
            locks: NameLocks::new(),
        }
    }

    fn entries(&self) -> Query {
        self.remote.root_children().with_mime_type(METADATA_MIME_TYPE)
    }

    async fn entry(&self, top: &str) -> StoreResult<Option<RemoteObject>> {
        self.remote.find_one(&self.entries().titled(top)).await
    }

    /// Record that shard `sub` exists under top-level shard `top`.
    ///
    /// Idempotent: when `sub` is already recorded no remote write is made.
    /// An empty `sub` only ensures the entry for `top` exists.
    pub async fn record_shard(&self, top: &str, sub: &str) -> StoreResult<()> {
        let _guard = self.locks.lock(top).await;

        match self.entry(top).await? {
            None => {
                let mut set = ShardSet::default();
                set.insert(sub);
                let spec = ObjectSpec::new(top)
                    .with_mime_type(METADATA_MIME_TYPE)
                    .with_parent(self.remote.root_id())
                    .with_description(set.encode());
                let created = self.remote.insert(&spec, None).await?;
                info!(top, sub, id = %created.id, "created registration entry");
            }
            Some(entry) => {
                let mut set = ShardSet::parse(&entry.description);
                if !set.insert(sub) {
                    debug!(top, sub, "shard already registered");
                    return Ok(());
                }
                let spec = ObjectSpec::default().with_description(set.encode());
                self.remote.update(&entry.id, &spec, None).await?;
                debug!(top, sub, shards = set.len(), "registered shard");
            }
        }
        Ok(())
    }

    /// Sub-shard names recorded under `top`; empty when there is no entry.
    pub async fn sub_shards(&self, top: &str) -> StoreResult<ShardSet> {
        Ok(self
            .entry(top)
            .await?
            .map(|entry| ShardSet::parse(&entry.description))
            .unwrap_or_default())
    }

    /// Page through the index and expand it into shard paths.
    ///
    /// `limit` bounds the number of index entries read, not the number of
    /// paths returned: each entry yields `top` when it has no sub-shards,
    /// otherwise one `top/sub` path per sub-shard. A zero limit reads
    /// nothing and hands `page_token` back unchanged.
    pub async fn list_registrations(
        &self,
        page_token: Option<&str>,
        limit: usize,
    ) -> StoreResult<(Vec<String>, Option<String>)> {
        if limit == 0 {
            return Ok((Vec::new(), page_token.map(str::to_string)));
        }
        let page = self
            .remote
            .query(&self.entries(), page_token, Some(limit))
            .await?;

        let mut paths = Vec::new();
        for entry in &page.items {
            let set = ShardSet::parse(&entry.description);
            if set.is_empty() {
                paths.push(entry.title.clone());
            } else {
                paths.extend(set.names().iter().map(|sub| format!("{}/{sub}", entry.title)));
            }
        }
        Ok((paths, page.next_page_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use skein_remote::{InMemoryRemote, RemoteClient, RemoteOp, FOLDER_MIME_TYPE};

    fn index() -> (Arc<InMemoryRemote>, RegistrationIndex) {
        let remote = Arc::new(InMemoryRemote::new("root"));
        let handle = RemoteHandle::new(remote.clone(), "root", None);
        (remote, RegistrationIndex::new(handle))
    }

    // -----------------------------------------------------------------------
    // Payload encoding
    // -----------------------------------------------------------------------

    #[test]
    fn parse_skips_empty_and_duplicate_names() {
        let set = ShardSet::parse("aa;;bb;aa;");
        assert_eq!(set.names(), &["aa".to_string(), "bb".to_string()]);
        assert_eq!(set.encode(), "aa;bb;");
    }

    #[test]
    fn membership_is_exact_not_substring() {
        let set = ShardSet::parse("abc;");
        assert!(!set.contains("ab"));
        assert!(!set.contains("bc"));
        assert!(set.contains("abc"));
    }

    #[test]
    fn empty_payload() {
        let set = ShardSet::parse("");
        assert!(set.is_empty());
        assert_eq!(set.encode(), "");
    }

    // -----------------------------------------------------------------------
    // record_shard
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn first_record_creates_entry() {
        let (remote, index) = index();
        index.record_shard("aa", "bb").await.unwrap();

        let entries = remote.objects_titled("aa");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].mime_type, METADATA_MIME_TYPE);
        assert_eq!(entries[0].description, "bb;");
        assert!(entries[0].has_parent("root"));
    }

    #[tokio::test]
    async fn repeated_record_is_idempotent() {
        let (remote, index) = index();
        index.record_shard("aa", "bb").await.unwrap();
        let set = index.sub_shards("aa").await.unwrap();
        assert_eq!(set.names(), &["bb".to_string()]);

        let writes = remote.stats().writes();
        index.record_shard("aa", "bb").await.unwrap();
        assert_eq!(remote.stats().writes(), writes, "no remote write for a known shard");

        let set = index.sub_shards("aa").await.unwrap();
        assert_eq!(set.names(), &["bb".to_string()]);
    }

    #[tokio::test]
    async fn new_sub_shard_is_appended() {
        let (remote, index) = index();
        index.record_shard("aa", "bb").await.unwrap();
        index.record_shard("aa", "cc").await.unwrap();

        let entries = remote.objects_titled("aa");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].description, "bb;cc;");
    }

    #[tokio::test]
    async fn empty_sub_only_creates_entry() {
        let (remote, index) = index();
        index.record_shard("aa", "").await.unwrap();
        index.record_shard("aa", "").await.unwrap();
        assert_eq!(remote.stats().inserts, 1);
        assert_eq!(remote.stats().updates, 0);
        assert!(index.sub_shards("aa").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn folder_with_same_name_is_not_an_entry() {
        let (remote, index) = index();
        remote
            .insert(&ObjectSpec::folder("aa", "root"), None)
            .await
            .unwrap();
        index.record_shard("aa", "bb").await.unwrap();

        let titled = remote.objects_titled("aa");
        assert_eq!(titled.len(), 2);
        assert_eq!(titled[0].mime_type, FOLDER_MIME_TYPE);
        assert_eq!(titled[0].description, "");
        assert_eq!(titled[1].description, "bb;");
    }

    #[tokio::test]
    async fn concurrent_records_for_same_top_keep_every_sub() {
        let remote = Arc::new(InMemoryRemote::new("root").with_latency(std::time::Duration::from_millis(5)));
        let index = Arc::new(RegistrationIndex::new(RemoteHandle::new(remote.clone(), "root", None)));

        let mut tasks = Vec::new();
        for sub in ["00", "11", "22", "33", "44"] {
            let index = index.clone();
            tasks.push(tokio::spawn(async move { index.record_shard("aa", sub).await }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let set = index.sub_shards("aa").await.unwrap();
        assert_eq!(set.len(), 5);
        assert_eq!(remote.objects_titled("aa").len(), 1);
    }

    #[tokio::test]
    async fn failed_update_leaves_entry_readable() {
        let (remote, index) = index();
        index.record_shard("aa", "bb").await.unwrap();
        remote.fail_next(RemoteOp::Update);
        assert!(index.record_shard("aa", "cc").await.is_err());

        let set = index.sub_shards("aa").await.unwrap();
        assert_eq!(set.names(), &["bb".to_string()]);
        index.record_shard("aa", "cc").await.unwrap();
        assert!(index.sub_shards("aa").await.unwrap().contains("cc"));
    }

    #[tokio::test]
    async fn separate_indexes_racing_on_existing_entry() {
        let remote = Arc::new(InMemoryRemote::new("root").with_latency(std::time::Duration::from_millis(10)));
        let first = RegistrationIndex::new(RemoteHandle::new(remote.clone(), "root", None));
        let second = RegistrationIndex::new(RemoteHandle::new(remote.clone(), "root", None));
        first.record_shard("aa", "00").await.unwrap();

        let (a, b) = tokio::join!(first.record_shard("aa", "bb"), second.record_shard("aa", "cc"));
        a.unwrap();
        b.unwrap();

        // Last writer wins: one registration may be lost, the payload never
        // becomes malformed.
        let entries = remote.objects_titled("aa");
        assert_eq!(entries.len(), 1);
        let set = ShardSet::parse(&entries[0].description);
        assert_eq!(set.encode(), entries[0].description);
        assert!(set.contains("00"));
        assert!(set.contains("bb") || set.contains("cc"));
    }

    #[tokio::test]
    async fn separate_indexes_racing_on_new_entry() {
        let remote = Arc::new(InMemoryRemote::new("root").with_latency(std::time::Duration::from_millis(10)));
        let first = RegistrationIndex::new(RemoteHandle::new(remote.clone(), "root", None));
        let second = RegistrationIndex::new(RemoteHandle::new(remote.clone(), "root", None));

        let (a, b) = tokio::join!(first.record_shard("aa", "bb"), second.record_shard("aa", "cc"));
        a.unwrap();
        b.unwrap();

        let entries = remote.objects_titled("aa");
        assert!((1..=2).contains(&entries.len()), "got {} entries", entries.len());
        let mut seen = ShardSet::default();
        for entry in &entries {
            assert_eq!(entry.mime_type, METADATA_MIME_TYPE);
            let set = ShardSet::parse(&entry.description);
            assert_eq!(set.encode(), entry.description);
            for name in set.names() {
                seen.insert(name);
            }
        }
        assert!(seen.contains("bb") || seen.contains("cc"));
        assert!(!first.sub_shards("aa").await.unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // list_registrations
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn list_expands_entries_into_paths() {
        let (_remote, index) = index();
        index.record_shard("aa", "bb").await.unwrap();
        index.record_shard("aa", "cc").await.unwrap();
        index.record_shard("dd", "").await.unwrap();

        let (paths, next) = index.list_registrations(None, 10).await.unwrap();
        assert_eq!(paths, ["aa/bb", "aa/cc", "dd"]);
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn list_with_zero_limit_reads_nothing() {
        let (remote, index) = index();
        index.record_shard("aa", "bb").await.unwrap();
        let queries = remote.stats().queries;

        let (paths, next) = index.list_registrations(None, 0).await.unwrap();
        assert!(paths.is_empty());
        assert!(next.is_none());
        let (paths, next) = index.list_registrations(Some("obj-0000000001"), 0).await.unwrap();
        assert!(paths.is_empty());
        assert_eq!(next.as_deref(), Some("obj-0000000001"));
        assert_eq!(remote.stats().queries, queries);
    }

    #[tokio::test]
    async fn list_pages_by_entry() {
        let (_remote, index) = index();
        for top in ["aa", "bb", "cc"] {
            index.record_shard(top, "00").await.unwrap();
        }

        let (first, next) = index.list_registrations(None, 2).await.unwrap();
        assert_eq!(first, ["aa/00", "bb/00"]);
        let (second, next) = index
            .list_registrations(next.as_deref(), 2)
            .await
            .unwrap();
        assert_eq!(second, ["cc/00"]);
        assert!(next.is_none());
    }
}
