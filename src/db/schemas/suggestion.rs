//! Suggestion set document schema

use serde::{Deserialize, Serialize};

/// Sub-collection under each user holding suggestion documents
pub const SUGGESTION_SUB_COLLECTION: &str = "suggestions";

/// Document id of the companion suggestion set
pub const COMPANION_SUGGESTIONS_ID: &str = "companions";

/// Suggestion set stored at `users/{userId}/suggestions/companions`
///
/// Fully replaced on every recompute.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionSetDoc {
    pub suggestions: Vec<SuggestionEntry>,

    /// Epoch milliseconds of the recompute
    pub last_updated: i64,
}

/// Snapshot of one suggested candidate
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionEntry {
    pub user_id: String,
    pub display_name: Option<String>,
    pub grief_stage: Option<String>,
    pub grief_type: Option<String>,
    pub bio: Option<String>,
    pub profile_image_url: Option<String>,
    pub compatibility_score: u32,
}
