//! Connection request, connection and chat document schemas

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::schemas::IntoIndexes;

/// Collection of companion requests
pub const CONNECTION_REQUEST_COLLECTION: &str = "connectionRequests";

/// Collection of established connections
pub const CONNECTION_COLLECTION: &str = "connections";

/// Collection of chats, one per connection with the same id
pub const CHAT_COLLECTION: &str = "chats";

/// Status of a connection request
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
    /// Any label this service does not act on
    #[serde(other)]
    Unknown,
}

/// Connection request stored at `connectionRequests/{requestId}`
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequestDoc {
    pub from_user_id: String,
    pub to_user_id: String,
    #[serde(default)]
    pub status: ConnectionStatus,
}

/// Status written on a new connection
pub const ACTIVE_STATUS: &str = "active";

/// Connection stored at `connections/{connectionId}`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDoc {
    /// The requester
    pub user1_id: String,
    /// The accepter
    pub user2_id: String,
    pub status: String,
    pub created_at: i64,
}

/// Chat stored at `chats/{connectionId}`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatDoc {
    pub participants: [String; 2],
    pub created_at: i64,
    pub last_message: Option<String>,
    pub last_message_at: Option<i64>,
}

impl IntoIndexes for ConnectionRequestDoc {
    fn collection() -> &'static str {
        CONNECTION_REQUEST_COLLECTION
    }

    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "toUserId": 1, "status": 1 },
            Some(
                IndexOptions::builder()
                    .name("to_user_status_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl IntoIndexes for ChatDoc {
    fn collection() -> &'static str {
        CHAT_COLLECTION
    }

    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "participants": 1 },
            Some(
                IndexOptions::builder()
                    .name("participants_index".to_string())
                    .build(),
            ),
        )]
    }
}
