//! Daily devotion document schema

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::schemas::IntoIndexes;

pub const DEVOTION_COLLECTION: &str = "dailyDevotions";

/// Date format of [`DevotionDoc::date`]
pub const DEVOTION_DATE_FORMAT: &str = "%Y-%m-%d";

/// Devotion stored at `dailyDevotions/{devotionId}`
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DevotionDoc {
    /// `YYYY-MM-DD` in the broadcast time zone
    pub date: String,
    #[serde(default)]
    pub title: String,
}

impl IntoIndexes for DevotionDoc {
    fn collection() -> &'static str {
        DEVOTION_COLLECTION
    }

    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "date": 1 },
            Some(IndexOptions::builder().name("date_index".to_string()).build()),
        )]
    }
}
