//! Document mutation notifications
//!
//! The store publishes one `MutationEvent` per document write, at least
//! once. Delivery is ordered per document only.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::db::DocPath;
use crate::types::{HearthError, Result};

/// Kind of change, derived from which states are present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// No before-state
    Create,
    /// Both states present
    Update,
    /// No after-state
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Create => "create",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Change notification for one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationEvent {
    /// Producer-assigned id, repeated on redelivery
    #[serde(default)]
    pub event_id: String,
    /// Full document path, e.g. `prayerRequests/r1/prayers/u1`
    pub document: String,
    #[serde(default)]
    pub before: Option<JsonValue>,
    #[serde(default)]
    pub after: Option<JsonValue>,
    /// Epoch milliseconds when the store published the change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<i64>,
}

impl MutationEvent {
    pub fn created(document: impl Into<String>, after: JsonValue) -> Self {
        Self::new(document, None, Some(after))
    }

    pub fn updated(document: impl Into<String>, before: JsonValue, after: JsonValue) -> Self {
        Self::new(document, Some(before), Some(after))
    }

    pub fn deleted(document: impl Into<String>, before: JsonValue) -> Self {
        Self::new(document, Some(before), None)
    }

    fn new(document: impl Into<String>, before: Option<JsonValue>, after: Option<JsonValue>) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            document: document.into(),
            before,
            after,
            published_at: None,
        }
    }

    /// Classify the change; `None` when neither state is present
    pub fn kind(&self) -> Option<ChangeKind> {
        match (&self.before, &self.after) {
            (None, Some(_)) => Some(ChangeKind::Create),
            (Some(_), Some(_)) => Some(ChangeKind::Update),
            (Some(_), None) => Some(ChangeKind::Delete),
            (None, None) => None,
        }
    }

    pub fn path(&self) -> Result<DocPath> {
        DocPath::parse(&self.document)
    }

    /// Decode a message payload from the mutation feed
    pub fn from_slice(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload)
            .map_err(|e| HearthError::InvalidDocument(format!("malformed mutation event: {}", e)))
    }
}
