use serde::{Deserialize, Serialize};

use crate::object::RemoteObject;

/// Page size used when a query does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Largest page a single query may return.
pub const MAX_PAGE_SIZE: usize = 1000;

/// A conjunctive search predicate over remote objects.
///
/// Every set field must match. Trashed objects are excluded unless
/// [`Query::including_trashed`] is used.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub parent: Option<String>,
    pub title: Option<String>,
    pub mime_type: Option<String>,
    pub include_trashed: bool,
}

impl Query {
    /// Direct children of `parent`.
    pub fn children_of(parent: impl Into<String>) -> Self {
        Self {
            parent: Some(parent.into()),
            ..Self::default()
        }
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn including_trashed(mut self) -> Self {
        self.include_trashed = true;
        self
    }

    /// Returns `true` if `object` satisfies every clause.
    pub fn matches(&self, object: &RemoteObject) -> bool {
        if !self.include_trashed && object.trashed {
            return false;
        }
        if let Some(parent) = &self.parent {
            if !object.has_parent(parent) {
                return false;
            }
        }
        if let Some(title) = &self.title {
            if &object.title != title {
                return false;
            }
        }
        if let Some(mime_type) = &self.mime_type {
            if &object.mime_type != mime_type {
                return false;
            }
        }
        true
    }

    /// Render the predicate in the remote service's query language.
    ///
    /// ```
    /// use skein_remote::Query;
    ///
    /// let q = Query::children_of("root").titled("it's");
    /// assert_eq!(
    ///     q.to_query_string(),
    ///     r"'root' in parents and title = 'it\'s' and trashed = false"
    /// );
    /// ```
    pub fn to_query_string(&self) -> String {
        let mut clauses = Vec::new();
        if let Some(parent) = &self.parent {
            clauses.push(format!("'{}' in parents", escape(parent)));
        }
        if let Some(title) = &self.title {
            clauses.push(format!("title = '{}'", escape(title)));
        }
        if let Some(mime_type) = &self.mime_type {
            clauses.push(format!("mimeType = '{}'", escape(mime_type)));
        }
        if !self.include_trashed {
            clauses.push("trashed = false".to_string());
        }
        clauses.join(" and ")
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// One page of query results.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryPage {
    pub items: Vec<RemoteObject>,
    /// Token resuming after the last item; `None` on the final page.
    pub next_page_token: Option<String>,
}
