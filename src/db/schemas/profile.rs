//! Companion profile document schema
//!
//! Written by the owning user; read by the suggestion pipeline.

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::schemas::IntoIndexes;

/// Collection holding one profile per user
pub const PROFILE_COLLECTION: &str = "profiles";

/// Profile document stored at `profiles/{userId}`
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDoc {
    /// Grief category (exact-match attribute)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grief_type: Option<String>,

    /// Grief stage label, see [`crate::matching::GriefStage`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grief_stage: Option<String>,

    /// Whether this profile may be suggested to others
    #[serde(default)]
    pub allow_matching: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
}

impl IntoIndexes for ProfileDoc {
    fn collection() -> &'static str {
        PROFILE_COLLECTION
    }

    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "griefType": 1, "allowMatching": 1 },
            Some(
                IndexOptions::builder()
                    .name("grief_type_matching_index".to_string())
                    .build(),
            ),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_wire_names() {
        let json = r#"{
            "griefType": "Loss of Parent",
            "griefStage": "Acceptance",
            "allowMatching": true,
            "displayName": "Ruth",
            "profileImageUrl": "https://img.example/ruth.png"
        }"#;

        let profile: ProfileDoc = serde_json::from_str(json).unwrap();
        assert_eq!(profile.grief_type.as_deref(), Some("Loss of Parent"));
        assert_eq!(profile.grief_stage.as_deref(), Some("Acceptance"));
        assert!(profile.allow_matching);
        assert!(profile.bio.is_none());
    }

    #[test]
    fn test_allow_matching_defaults_false() {
        let profile: ProfileDoc = serde_json::from_str("{}").unwrap();
        assert!(!profile.allow_matching);
    }
}
