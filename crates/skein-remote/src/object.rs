use serde::{Deserialize, Serialize};

/// MIME type marking an object as a folder.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.skein.folder";

/// MIME type of registration index entries (metadata-only objects).
pub const METADATA_MIME_TYPE: &str = "application/vnd.skein.metadata";

/// MIME type of stored blob content.
pub const BLOB_MIME_TYPE: &str = "application/octet-stream";

/// An entry in the remote folder tree: a file, a folder, or a metadata
/// object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    /// Remote-assigned, opaque, stable identifier.
    pub id: String,
    /// Display name. Blob objects carry their reference string here.
    pub title: String,
    pub mime_type: String,
    /// IDs of the folders this object is filed under.
    pub parents: Vec<String>,
    /// Content size in bytes (0 for folders and metadata objects).
    pub size: u64,
    /// Present only once content has been uploaded.
    pub download_url: Option<String>,
    /// Free-form description.
    pub description: String,
    pub trashed: bool,
}

impl RemoteObject {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    /// Returns `true` if this object is filed under `parent`.
    pub fn has_parent(&self, parent: &str) -> bool {
        self.parents.iter().any(|p| p == parent)
    }
}

/// The writable fields of a [`RemoteObject`], sent on insert and update.
///
/// On update, `None` and empty fields leave the stored value unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSpec {
    pub title: String,
    pub mime_type: Option<String>,
    pub parents: Vec<String>,
    pub description: Option<String>,
}

impl ObjectSpec {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// A folder named `title` under `parent`.
    pub fn folder(title: impl Into<String>, parent: impl Into<String>) -> Self {
        Self::new(title)
            .with_mime_type(FOLDER_MIME_TYPE)
            .with_parent(parent)
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        let parent = parent.into();
        if !self.parents.contains(&parent) {
            self.parents.push(parent);
        }
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl From<&RemoteObject> for ObjectSpec {
    fn from(object: &RemoteObject) -> Self {
        Self {
            title: object.title.clone(),
            mime_type: Some(object.mime_type.clone()),
            parents: object.parents.clone(),
            description: Some(object.description.clone()),
        }
    }
}
