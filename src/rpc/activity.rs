//! Activity recorder RPC
//!
//! Appends an activity record for the calling user and stamps their
//! `lastActive`. Both writes go in one batch, so a failure leaves neither
//! behind and the caller sees `internal`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::{error, info};

use crate::db::schemas::{
    ActivityDoc, ACTIVITY_SUB_COLLECTION, USER_ACTIVITY_COLLECTION, USER_COLLECTION,
};
use crate::db::{DocPath, DocumentStore, FieldOp, WriteBatch};

/// Verified identity of an RPC caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub uid: String,
}

/// Call payload; every field may be omitted
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecordActivityRequest {
    #[serde(default)]
    pub action: String,
    /// Free-form key-value context
    #[serde(default)]
    pub metadata: Option<Map<String, JsonValue>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordActivityResponse {
    pub success: bool,
}

/// Typed RPC failure
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RpcError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Internal(String),
}

impl RpcError {
    pub fn unauthenticated() -> Self {
        RpcError::Unauthenticated("User must be authenticated".into())
    }

    /// Wire status string
    pub fn status(&self) -> &'static str {
        match self {
            RpcError::Unauthenticated(_) => "UNAUTHENTICATED",
            RpcError::Internal(_) => "INTERNAL",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            RpcError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            RpcError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error envelope returned to callers
    pub fn to_json(&self) -> JsonValue {
        serde_json::json!({
            "error": {
                "status": self.status(),
                "message": self.to_string(),
            }
        })
    }
}

pub struct ActivityRecorder {
    store: Arc<dyn DocumentStore>,
}

impl ActivityRecorder {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn record_activity(
        &self,
        caller: Option<&CallerIdentity>,
        request: RecordActivityRequest,
        now: DateTime<Utc>,
    ) -> Result<RecordActivityResponse, RpcError> {
        let Some(caller) = caller else {
            return Err(RpcError::unauthenticated());
        };

        let record = ActivityDoc {
            action: request.action,
            metadata: JsonValue::Object(request.metadata.unwrap_or_default()),
            timestamp: now.timestamp_millis(),
        };

        let user = DocPath::new(USER_COLLECTION, caller.uid.as_str());
        let activity = DocPath::new(USER_ACTIVITY_COLLECTION, caller.uid.as_str()).child(
            ACTIVITY_SUB_COLLECTION,
            uuid::Uuid::new_v4().simple().to_string(),
        );

        let data = serde_json::to_value(&record)
            .map_err(|e| RpcError::Internal(format!("Failed to encode activity: {}", e)))?;

        let mut batch = WriteBatch::new();
        batch
            .create(activity.clone(), data)
            .update(user, vec![FieldOp::server_timestamp("lastActive")]);

        if let Err(e) = self.store.commit(batch).await {
            error!(user_id = %caller.uid, "Error recording user activity: {}", e);
            return Err(RpcError::Internal("Failed to record activity".into()));
        }

        info!(user_id = %caller.uid, action = %record.action, path = %activity, "Activity recorded");
        Ok(RecordActivityResponse { success: true })
    }
}
