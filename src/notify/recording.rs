//! In-memory notifier that records every send
//!
//! Test double for handlers and jobs. Individual tokens can be marked as
//! undeliverable, and the whole transport can be switched off.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::notify::{
    MulticastMessage, MulticastResponse, PushMessage, PushNotifier, SendResponse,
    MAX_MULTICAST_TOKENS,
};
use crate::types::{HearthError, Result};

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<PushMessage>>,
    multicasts: Mutex<Vec<MulticastMessage>>,
    bad_tokens: Mutex<HashSet<String>>,
    offline: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report failure for this token
    pub fn reject_token(&self, token: &str) {
        if let Ok(mut bad) = self.bad_tokens.lock() {
            bad.insert(token.to_string());
        }
    }

    /// Fail every call with a transport error
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Single sends, in order
    pub fn sent(&self) -> Vec<PushMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Multicast calls, in order
    pub fn multicasts(&self) -> Vec<MulticastMessage> {
        self.multicasts.lock().map(|m| m.clone()).unwrap_or_default()
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(HearthError::Notification("transport offline".into()));
        }
        Ok(())
    }

    fn is_bad(&self, token: &str) -> bool {
        self.bad_tokens
            .lock()
            .map(|bad| bad.contains(token))
            .unwrap_or(false)
    }

    fn lock_poisoned() -> HearthError {
        HearthError::Internal("recording notifier lock poisoned".into())
    }
}

#[async_trait]
impl PushNotifier for RecordingNotifier {
    async fn send(&self, message: PushMessage) -> Result<String> {
        self.check_online()?;
        if self.is_bad(&message.token) {
            return Err(HearthError::Notification(format!(
                "token not registered: {}",
                message.token
            )));
        }

        let mut sent = self.sent.lock().map_err(|_| Self::lock_poisoned())?;
        sent.push(message);
        Ok(format!("msg-{}", sent.len()))
    }

    async fn send_multicast(&self, message: MulticastMessage) -> Result<MulticastResponse> {
        self.check_online()?;
        if message.tokens.len() > MAX_MULTICAST_TOKENS {
            return Err(HearthError::Notification("too many tokens".into()));
        }

        let responses = message
            .tokens
            .iter()
            .enumerate()
            .map(|(i, token)| {
                if self.is_bad(token) {
                    SendResponse::failed("token not registered")
                } else {
                    SendResponse::delivered(format!("multi-{}", i))
                }
            })
            .collect();

        self.multicasts
            .lock()
            .map_err(|_| Self::lock_poisoned())?
            .push(message);
        Ok(MulticastResponse::from_responses(responses))
    }
}
