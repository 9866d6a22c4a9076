//! Prayer request document schema

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::schemas::IntoIndexes;

/// Collection of prayer requests
pub const PRAYER_REQUEST_COLLECTION: &str = "prayerRequests";

/// Sub-collection of individual prayers under a request
pub const PRAYER_SUB_COLLECTION: &str = "prayers";

/// Prayer request stored at `prayerRequests/{requestId}`
///
/// `pray_count` only ever grows. It is changed by atomic increments, never
/// by writing back a value that was read.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrayerRequestDoc {
    #[serde(default)]
    pub pray_count: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_prayed_at: Option<i64>,

    /// Epoch milliseconds; drives retention cleanup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl IntoIndexes for PrayerRequestDoc {
    fn collection() -> &'static str {
        PRAYER_REQUEST_COLLECTION
    }

    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "createdAt": 1 },
            Some(
                IndexOptions::builder()
                    .name("created_at_index".to_string())
                    .build(),
            ),
        )]
    }
}
