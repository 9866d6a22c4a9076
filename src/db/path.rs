//! Document and collection paths
//!
//! Paths alternate collection and document segments, so a document path has
//! an even number of segments (`prayerRequests/r1/prayers/u1`) and a
//! collection path has an odd number (`prayerRequests/r1/prayers`).

use std::fmt;

use crate::types::{HearthError, Result};

/// Full path of one document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath {
    collection: String,
    id: String,
}

impl DocPath {
    /// Build a path from a collection path and a document id
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Parse `a/b` or `a/b/c/d` style document paths
    pub fn parse(path: &str) -> Result<Self> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        if segments.len() % 2 != 0 || segments.iter().any(|s| s.is_empty()) {
            return Err(HearthError::InvalidDocument(format!(
                "not a document path: {}",
                path
            )));
        }

        let (id, collection) = segments
            .split_last()
            .ok_or_else(|| HearthError::InvalidDocument("empty document path".into()))?;

        Ok(Self::new(collection.join("/"), *id))
    }

    /// Collection path this document lives in
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Document id (last segment)
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Path of a sub-collection under this document
    pub fn sub_collection(&self, name: &str) -> String {
        format!("{}/{}", self, name)
    }

    /// Path of a document in a sub-collection under this document
    pub fn child(&self, collection: &str, id: impl Into<String>) -> DocPath {
        DocPath::new(self.sub_collection(collection), id)
    }

    /// The document owning this document's collection, if nested
    pub fn parent(&self) -> Option<DocPath> {
        let (parent, _) = self.collection.rsplit_once('/')?;
        DocPath::parse(parent).ok()
    }

    /// Backend collection key, see [`collection_key`]
    pub fn collection_key(&self) -> String {
        collection_key(&self.collection)
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Collapse a collection path to its collection names joined by `.`
///
/// `prayerRequests/r1/prayers` becomes `prayerRequests.prayers`. All
/// sub-collections of one kind share a key regardless of their parent.
pub fn collection_key(collection: &str) -> String {
    collection
        .trim_matches('/')
        .split('/')
        .step_by(2)
        .collect::<Vec<_>>()
        .join(".")
}

/// Parent document of a collection path (`None` for root collections)
pub fn collection_parent(collection: &str) -> Option<String> {
    collection
        .trim_matches('/')
        .rsplit_once('/')
        .map(|(parent, _)| parent.to_string())
}
