//! Firebase Cloud Messaging HTTP v1 client
//!
//! The v1 API sends one message per request, so a multicast fans out into
//! concurrent single sends and collects per-token results.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};

use crate::notify::{
    MulticastMessage, MulticastResponse, PushMessage, PushNotifier, SendResponse,
    MAX_MULTICAST_TOKENS,
};
use crate::types::{HearthError, Result};

pub const DEFAULT_FCM_ENDPOINT: &str = "https://fcm.googleapis.com";

/// FCM connection settings
#[derive(Debug, Clone)]
pub struct FcmConfig {
    pub project_id: String,
    /// OAuth2 bearer token for the service account
    pub access_token: String,
    /// Base URL, overridable for emulators
    pub endpoint: String,
    pub request_timeout: Duration,
}

impl FcmConfig {
    pub fn new(project_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            access_token: access_token.into(),
            endpoint: DEFAULT_FCM_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.endpoint.trim_end_matches('/'),
            self.project_id
        )
    }
}

#[derive(Debug, Deserialize)]
struct SendResult {
    name: String,
}

/// FCM-backed [`PushNotifier`]
pub struct FcmNotifier {
    config: FcmConfig,
    http_client: reqwest::Client,
}

impl FcmNotifier {
    pub fn new(config: FcmConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent("hearth/0.1")
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }
}

/// Request body for one v1 `messages:send` call
fn request_body(message: &PushMessage) -> JsonValue {
    json!({
        "message": {
            "token": message.token,
            "notification": {
                "title": message.title,
                "body": message.body,
            },
            "data": message.data,
        }
    })
}

#[async_trait]
impl PushNotifier for FcmNotifier {
    async fn send(&self, message: PushMessage) -> Result<String> {
        let response = self
            .http_client
            .post(self.config.send_url())
            .bearer_auth(&self.config.access_token)
            .json(&request_body(&message))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(HearthError::Notification(format!(
                "FCM returned {}: {}",
                status, detail
            )));
        }

        let result: SendResult = response.json().await?;
        debug!(message_id = %result.name, "Push notification sent");
        Ok(result.name)
    }

    async fn send_multicast(&self, message: MulticastMessage) -> Result<MulticastResponse> {
        if message.tokens.len() > MAX_MULTICAST_TOKENS {
            return Err(HearthError::Notification(format!(
                "multicast of {} tokens exceeds the limit of {}",
                message.tokens.len(),
                MAX_MULTICAST_TOKENS
            )));
        }

        let sends = message
            .tokens
            .iter()
            .map(|token| self.send(message.for_token(token)));

        let responses = join_all(sends)
            .await
            .into_iter()
            .map(|result| match result {
                Ok(id) => SendResponse::delivered(id),
                Err(e) => {
                    warn!("Multicast recipient failed: {}", e);
                    SendResponse::failed(e.to_string())
                }
            })
            .collect();

        Ok(MulticastResponse::from_responses(responses))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::notification_data;

    #[test]
    fn test_send_url() {
        let config = FcmConfig::new("hearth-prod", "token").with_endpoint("http://localhost:9099/");
        assert_eq!(
            config.send_url(),
            "http://localhost:9099/v1/projects/hearth-prod/messages:send"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let body = request_body(&PushMessage {
            token: "device-1".into(),
            title: "New Companion Request".into(),
            body: "Ruth wants to connect with you as a grief companion".into(),
            data: notification_data([("type", "connection_request"), ("requestId", "r1")]),
        });

        assert_eq!(body["message"]["token"], "device-1");
        assert_eq!(body["message"]["notification"]["title"], "New Companion Request");
        assert_eq!(body["message"]["data"]["requestId"], "r1");
    }

    #[tokio::test]
    async fn test_oversized_multicast_rejected() {
        let notifier = FcmNotifier::new(FcmConfig::new("p", "t")).unwrap();
        let message = MulticastMessage {
            tokens: vec!["x".to_string(); MAX_MULTICAST_TOKENS + 1],
            title: String::new(),
            body: String::new(),
            data: Default::default(),
        };
        assert!(notifier.send_multicast(message).await.is_err());
    }
}
