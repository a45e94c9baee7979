use skein_remote::{ObjectSpec, Query, RemoteObject, FOLDER_MIME_TYPE};
use skein_types::ShardPath;
use tracing::{debug, info};

use crate::error::StoreResult;
use crate::flight::SingleFlight;
use crate::handle::RemoteHandle;

/// Materializes shard folder chains under the store root.
///
/// [`Sharder::ensure_path`] is not transactional. Every step queries before
/// it creates, so a chain left half-built by a failed call is resumed, not
/// duplicated, by the next call for the same path. Concurrent steps for the
/// same `(parent, name)` inside this process share one lookup-or-create.
pub struct Sharder {
    remote: RemoteHandle,
    steps: SingleFlight<(String, String), StoreResult<RemoteObject>>,
}

impl Sharder {
    pub(crate) fn new(remote: RemoteHandle) -> Self {
        Self {
            remote,
            steps: SingleFlight::new(),
        }
    }

    /// Ensure every folder of `path` exists and return the deepest one.
    ///
    /// The empty path resolves to the store root.
    pub async fn ensure_path(&self, path: &ShardPath) -> StoreResult<RemoteObject> {
        let mut current = self.remote.root_folder();
        for segment in path.segments() {
            let key = (current.id.clone(), segment.clone());
            current = self
                .steps
                .run(key, || self.child_folder(&current, segment))
                .await?;
        }
        Ok(current)
    }

    /// Find the folder `name` under `parent`, creating it if missing.
    async fn child_folder(&self, parent: &RemoteObject, name: &str) -> StoreResult<RemoteObject> {
        let query = Query::children_of(parent.id.as_str())
            .titled(name)
            .with_mime_type(FOLDER_MIME_TYPE);
        if let Some(folder) = self.remote.find_one(&query).await? {
            debug!(segment = name, id = %folder.id, "shard folder exists");
            return Ok(folder);
        }
        let folder = self
            .remote
            .insert(&ObjectSpec::folder(name, parent.id.as_str()), None)
            .await?;
        info!(segment = name, parent = %parent.id, id = %folder.id, "created shard folder");
        Ok(folder)
    }
}
