//! Notifier that only logs, for dev mode

use async_trait::async_trait;
use tracing::info;

use crate::notify::{MulticastMessage, MulticastResponse, PushMessage, PushNotifier, SendResponse};
use crate::types::Result;

#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl PushNotifier for LogNotifier {
    async fn send(&self, message: PushMessage) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        info!(
            token = %message.token,
            title = %message.title,
            body = %message.body,
            data = ?message.data,
            message_id = %id,
            "[dev] push notification"
        );
        Ok(id)
    }

    async fn send_multicast(&self, message: MulticastMessage) -> Result<MulticastResponse> {
        info!(
            recipients = message.tokens.len(),
            title = %message.title,
            body = %message.body,
            data = ?message.data,
            "[dev] multicast notification"
        );
        let responses = message
            .tokens
            .iter()
            .map(|_| SendResponse::delivered(uuid::Uuid::new_v4().to_string()))
            .collect();
        Ok(MulticastResponse::from_responses(responses))
    }
}
