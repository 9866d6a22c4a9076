//! Document schemas for Hearth
//!
//! Typed views of the documents handlers read and write. Handlers move
//! `serde_json::Value` through the [`DocumentStore`](crate::db::DocumentStore)
//! and decode into these structs at the edges.

mod activity;
mod connection;
mod devotion;
mod prayer;
mod profile;
mod suggestion;
mod user;

use bson::Document;
use mongodb::options::IndexOptions;

pub use activity::{ActivityDoc, ACTIVITY_SUB_COLLECTION, USER_ACTIVITY_COLLECTION};
pub use connection::{
    ChatDoc, ConnectionDoc, ConnectionRequestDoc, ConnectionStatus, ACTIVE_STATUS,
    CHAT_COLLECTION, CONNECTION_COLLECTION, CONNECTION_REQUEST_COLLECTION,
};
pub use devotion::{DevotionDoc, DEVOTION_COLLECTION, DEVOTION_DATE_FORMAT};
pub use prayer::{PrayerRequestDoc, PRAYER_REQUEST_COLLECTION, PRAYER_SUB_COLLECTION};
pub use profile::{ProfileDoc, PROFILE_COLLECTION};
pub use suggestion::{
    SuggestionEntry, SuggestionSetDoc, COMPANION_SUGGESTIONS_ID, SUGGESTION_SUB_COLLECTION,
};
pub use user::{UserDoc, UserPreferences, DEFAULT_DISPLAY_NAME, USER_COLLECTION};

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    /// MongoDB collection name the indexes apply to
    fn collection() -> &'static str;

    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

fn entry<T: IntoIndexes>() -> (&'static str, Vec<(Document, Option<IndexOptions>)>) {
    (T::collection(), T::into_indices())
}

/// Every collection with its index definitions
pub fn collection_indexes() -> Vec<(&'static str, Vec<(Document, Option<IndexOptions>)>)> {
    vec![
        entry::<ProfileDoc>(),
        entry::<UserDoc>(),
        entry::<PrayerRequestDoc>(),
        entry::<ConnectionRequestDoc>(),
        entry::<ChatDoc>(),
        entry::<DevotionDoc>(),
        entry::<ActivityDoc>(),
    ]
}
