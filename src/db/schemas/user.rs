//! User account document schema
//!
//! Holds the push token, notification preferences and last-active time.

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::schemas::IntoIndexes;

/// Collection for user accounts
pub const USER_COLLECTION: &str = "users";

/// Name used when a user has no display name
pub const DEFAULT_DISPLAY_NAME: &str = "Someone";

/// User document stored at `users/{userId}`
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Device push token; absent when the user never registered a device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,

    #[serde(default)]
    pub preferences: UserPreferences,

    /// Epoch milliseconds of the last recorded activity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<i64>,
}

/// Notification preferences
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    #[serde(default)]
    pub daily_devotion: bool,
}

impl UserDoc {
    /// Display name, falling back to [`DEFAULT_DISPLAY_NAME`]
    pub fn name_or_default(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_DISPLAY_NAME)
    }

    /// Push token if present and non-empty
    pub fn token(&self) -> Option<&str> {
        self.push_token.as_deref().filter(|t| !t.is_empty())
    }
}

impl IntoIndexes for UserDoc {
    fn collection() -> &'static str {
        USER_COLLECTION
    }

    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "preferences.dailyDevotion": 1 },
            Some(
                IndexOptions::builder()
                    .name("daily_devotion_index".to_string())
                    .build(),
            ),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let user: UserDoc = serde_json::from_str("{}").unwrap();
        assert_eq!(user.name_or_default(), "Someone");
        assert!(user.token().is_none());
        assert!(!user.preferences.daily_devotion);
    }

    #[test]
    fn test_empty_strings_treated_as_absent() {
        let user: UserDoc =
            serde_json::from_str(r#"{"displayName": "", "pushToken": ""}"#).unwrap();
        assert_eq!(user.name_or_default(), "Someone");
        assert!(user.token().is_none());
    }

    #[test]
    fn test_nested_preferences() {
        let user: UserDoc = serde_json::from_str(
            r#"{"displayName": "Naomi", "pushToken": "tok-1", "preferences": {"dailyDevotion": true}}"#,
        )
        .unwrap();
        assert_eq!(user.name_or_default(), "Naomi");
        assert_eq!(user.token(), Some("tok-1"));
        assert!(user.preferences.daily_devotion);
    }
}
