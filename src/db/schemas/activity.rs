//! User activity log schema

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::db::schemas::IntoIndexes;

/// Top-level collection owning per-user activity logs
pub const USER_ACTIVITY_COLLECTION: &str = "userActivity";

/// Sub-collection of activity records
pub const ACTIVITY_SUB_COLLECTION: &str = "activities";

/// Append-only record at `userActivity/{userId}/activities/{autoId}`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDoc {
    pub action: String,
    pub metadata: JsonValue,
    pub timestamp: i64,
}

impl IntoIndexes for ActivityDoc {
    /// Mongo collection for every user's activity sub-collection
    fn collection() -> &'static str {
        "userActivity.activities"
    }

    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "_parent": 1, "timestamp": -1 },
            Some(
                IndexOptions::builder()
                    .name("parent_timestamp_index".to_string())
                    .build(),
            ),
        )]
    }
}
