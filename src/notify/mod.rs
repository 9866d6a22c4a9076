//! Push notification transport
//!
//! Handlers and jobs talk to a [`PushNotifier`]. Delivery results are logged
//! and never retried; nothing about a send is persisted.
//!
//! - `fcm`: Firebase Cloud Messaging HTTP v1 client
//! - `log`: dev-mode notifier that only logs
//! - `recording`: in-memory notifier for tests

pub mod fcm;
pub mod log;
pub mod recording;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::Result;

pub use fcm::{FcmConfig, FcmNotifier};
pub use log::LogNotifier;
pub use recording::RecordingNotifier;

/// Most tokens the transport accepts in one multicast call
pub const MAX_MULTICAST_TOKENS: usize = 500;

/// String-only payload delivered alongside the visible notification
pub type NotificationData = BTreeMap<String, String>;

/// Build a [`NotificationData`] map from pairs
pub fn notification_data<const N: usize>(pairs: [(&str, &str); N]) -> NotificationData {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Notification to a single device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    pub token: String,
    pub title: String,
    pub body: String,
    pub data: NotificationData,
}

/// Same notification to many devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MulticastMessage {
    pub tokens: Vec<String>,
    pub title: String,
    pub body: String,
    pub data: NotificationData,
}

impl MulticastMessage {
    /// Split into messages of at most `size` tokens
    pub fn chunks(&self, size: usize) -> Vec<MulticastMessage> {
        self.tokens
            .chunks(size.max(1))
            .map(|tokens| MulticastMessage {
                tokens: tokens.to_vec(),
                title: self.title.clone(),
                body: self.body.clone(),
                data: self.data.clone(),
            })
            .collect()
    }

    /// Single-device message for one of the tokens
    pub fn for_token(&self, token: &str) -> PushMessage {
        PushMessage {
            token: token.to_string(),
            title: self.title.clone(),
            body: self.body.clone(),
            data: self.data.clone(),
        }
    }
}

/// Delivery result for one token of a multicast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendResponse {
    pub fn delivered(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }
}

/// Per-recipient results of a multicast, in token order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MulticastResponse {
    pub success_count: usize,
    pub failure_count: usize,
    pub responses: Vec<SendResponse>,
}

impl MulticastResponse {
    pub fn from_responses(responses: Vec<SendResponse>) -> Self {
        let success_count = responses.iter().filter(|r| r.success).count();
        Self {
            success_count,
            failure_count: responses.len() - success_count,
            responses,
        }
    }

    /// Fold another chunk's results into this one
    pub fn merge(&mut self, other: MulticastResponse) {
        self.success_count += other.success_count;
        self.failure_count += other.failure_count;
        self.responses.extend(other.responses);
    }
}

/// Injected push transport
#[async_trait]
pub trait PushNotifier: Send + Sync {
    /// Send to one device, returning the transport's message id
    async fn send(&self, message: PushMessage) -> Result<String>;

    /// Send to up to [`MAX_MULTICAST_TOKENS`] devices
    ///
    /// Per-token failures are reported in the response; `Err` means the
    /// whole call failed.
    async fn send_multicast(&self, message: MulticastMessage) -> Result<MulticastResponse>;
}
