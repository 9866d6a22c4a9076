//! Companion connection state machine
//!
//! ```text
//! pending ──accept──▶ accepted   creates Connection + Chat, notifies requester
//!    │
//!    └──reject──▶ rejected       no action
//! ```
//!
//! Creation of a request notifies the recipient. Acceptance writes the
//! connection and its chat in one atomic batch of creates keyed by the
//! request id, so a redelivered acceptance fails with `AlreadyExists` and
//! is reported as a duplicate instead of creating a second pair.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use crate::db::schemas::{
    ChatDoc, ConnectionDoc, ConnectionRequestDoc, ConnectionStatus, UserDoc, ACTIVE_STATUS,
    CHAT_COLLECTION, CONNECTION_COLLECTION, USER_COLLECTION,
};
use crate::db::{DocPath, DocumentStore, WriteBatch};
use crate::events::{EventContext, EventHandler, HandlerOutcome};
use crate::notify::{notification_data, PushMessage, PushNotifier};
use crate::types::{HearthError, Result};

pub const REQUEST_TITLE: &str = "New Companion Request";
pub const ACCEPTED_TITLE: &str = "Connection Accepted!";

fn decode_request(ctx: &EventContext, state: Option<&JsonValue>) -> Result<ConnectionRequestDoc> {
    let state = state.ok_or_else(|| {
        HearthError::InvalidDocument(format!("{}: missing document state", ctx.path))
    })?;
    serde_json::from_value(state.clone())
        .map_err(|e| HearthError::InvalidDocument(format!("{}: {}", ctx.path, e)))
}

/// Load a user account; a missing document reads as an empty account
async fn load_user(store: &dyn DocumentStore, user_id: &str) -> Result<UserDoc> {
    match store.get(&DocPath::new(USER_COLLECTION, user_id)).await? {
        Some(doc) => doc.decode(),
        None => Ok(UserDoc::default()),
    }
}

// ============================================================================
// Request created
// ============================================================================

/// Notifies the recipient of a new companion request
pub struct ConnectionRequestNotifier {
    store: Arc<dyn DocumentStore>,
    notifier: Arc<dyn PushNotifier>,
}

impl ConnectionRequestNotifier {
    pub fn new(store: Arc<dyn DocumentStore>, notifier: Arc<dyn PushNotifier>) -> Self {
        Self { store, notifier }
    }
}

#[async_trait]
impl EventHandler for ConnectionRequestNotifier {
    fn name(&self) -> &'static str {
        "notify_connection_request"
    }

    async fn handle(&self, ctx: &EventContext) -> Result<HandlerOutcome> {
        let request_id = ctx.params.require("requestId")?;
        let request = decode_request(ctx, ctx.after.as_ref())?;

        let recipient = load_user(self.store.as_ref(), &request.to_user_id).await?;
        let Some(token) = recipient.token() else {
            return Ok(HandlerOutcome::skipped("recipient has no push token"));
        };

        let sender = load_user(self.store.as_ref(), &request.from_user_id).await?;
        let message = PushMessage {
            token: token.to_string(),
            title: REQUEST_TITLE.to_string(),
            body: format!(
                "{} wants to connect with you as a grief companion",
                sender.name_or_default()
            ),
            data: notification_data([
                ("type", "connection_request"),
                ("requestId", request_id),
                ("fromUserId", request.from_user_id.as_str()),
            ]),
        };

        self.notifier.send(message).await?;
        info!(
            "Sent connection request notification to {}",
            request.to_user_id
        );
        Ok(HandlerOutcome::Applied)
    }
}

// ============================================================================
// Request accepted
// ============================================================================

/// Creates the connection and chat when a request becomes accepted
pub struct ConnectionAcceptanceHandler {
    store: Arc<dyn DocumentStore>,
    notifier: Arc<dyn PushNotifier>,
}

impl ConnectionAcceptanceHandler {
    pub fn new(store: Arc<dyn DocumentStore>, notifier: Arc<dyn PushNotifier>) -> Self {
        Self { store, notifier }
    }

    /// Write the connection and its chat atomically
    ///
    /// Returns `Ok(false)` when they already exist.
    async fn create_connection(
        &self,
        connection_id: &str,
        request: &ConnectionRequestDoc,
    ) -> Result<bool> {
        let now = Utc::now().timestamp_millis();
        let connection = ConnectionDoc {
            user1_id: request.from_user_id.clone(),
            user2_id: request.to_user_id.clone(),
            status: ACTIVE_STATUS.to_string(),
            created_at: now,
        };
        let chat = ChatDoc {
            participants: [request.from_user_id.clone(), request.to_user_id.clone()],
            created_at: now,
            last_message: None,
            last_message_at: None,
        };

        let mut batch = WriteBatch::new();
        batch
            .create(
                DocPath::new(CONNECTION_COLLECTION, connection_id),
                serde_json::to_value(&connection)?,
            )
            .create(
                DocPath::new(CHAT_COLLECTION, connection_id),
                serde_json::to_value(&chat)?,
            );

        match self.store.commit(batch).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_already_exists() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn notify_requester(&self, connection_id: &str, request: &ConnectionRequestDoc) -> Result<bool> {
        let requester = load_user(self.store.as_ref(), &request.from_user_id).await?;
        let Some(token) = requester.token() else {
            return Ok(false);
        };

        let accepter = load_user(self.store.as_ref(), &request.to_user_id).await?;
        let message = PushMessage {
            token: token.to_string(),
            title: ACCEPTED_TITLE.to_string(),
            body: format!(
                "{} accepted your companion request",
                accepter.name_or_default()
            ),
            data: notification_data([
                ("type", "connection_accepted"),
                ("connectionId", connection_id),
                ("companionId", request.to_user_id.as_str()),
            ]),
        };

        self.notifier.send(message).await?;
        Ok(true)
    }
}

#[async_trait]
impl EventHandler for ConnectionAcceptanceHandler {
    fn name(&self) -> &'static str {
        "handle_connection_acceptance"
    }

    async fn handle(&self, ctx: &EventContext) -> Result<HandlerOutcome> {
        let before = decode_request(ctx, ctx.before.as_ref())?;
        let after = decode_request(ctx, ctx.after.as_ref())?;

        if before.status == ConnectionStatus::Accepted || after.status != ConnectionStatus::Accepted {
            return Ok(HandlerOutcome::skipped(format!(
                "transition {:?} -> {:?} needs no action",
                before.status, after.status
            )));
        }

        let connection_id = ctx.params.require("requestId")?;
        if !self.create_connection(connection_id, &after).await? {
            return Ok(HandlerOutcome::skipped(format!(
                "connection {} already exists",
                connection_id
            )));
        }

        info!(
            "Created connection {} between {} and {}",
            connection_id, after.from_user_id, after.to_user_id
        );

        // The records are committed; a failed notification does not undo them
        if let Err(e) = self.notify_requester(connection_id, &after).await {
            warn!(
                connection_id = connection_id,
                "Failed to notify requester of acceptance: {}", e
            );
        }

        Ok(HandlerOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::events::{ChangeKind, DispatchOutcome, Dispatcher, MutationEvent};
    use crate::notify::RecordingNotifier;
    use serde_json::json;

    struct Fixture {
        store: Arc<MemoryStore>,
        notifier: Arc<RecordingNotifier>,
        dispatcher: Dispatcher,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());

        store
            .seed(
                &DocPath::new("users", "alice"),
                json!({"displayName": "Alice", "pushToken": "tok-alice"}),
            )
            .await;
        store
            .seed(
                &DocPath::new("users", "bob"),
                json!({"displayName": "Bob", "pushToken": "tok-bob"}),
            )
            .await;

        let dispatcher = Dispatcher::new()
            .route(
                "connectionRequests/{requestId}",
                &[ChangeKind::Create],
                Arc::new(ConnectionRequestNotifier::new(store.clone(), notifier.clone())),
            )
            .unwrap()
            .route(
                "connectionRequests/{requestId}",
                &[ChangeKind::Update],
                Arc::new(ConnectionAcceptanceHandler::new(store.clone(), notifier.clone())),
            )
            .unwrap();

        Fixture {
            store,
            notifier,
            dispatcher,
        }
    }

    fn request(status: &str) -> JsonValue {
        json!({"fromUserId": "alice", "toUserId": "bob", "status": status})
    }

    #[tokio::test]
    async fn test_request_notifies_recipient() {
        let f = fixture().await;
        f.dispatcher
            .dispatch(MutationEvent::created("connectionRequests/r1", request("pending")))
            .await;

        let sent = f.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].token, "tok-bob");
        assert_eq!(sent[0].title, "New Companion Request");
        assert_eq!(sent[0].body, "Alice wants to connect with you as a grief companion");
        assert_eq!(sent[0].data["type"], "connection_request");
        assert_eq!(sent[0].data["requestId"], "r1");
        assert_eq!(sent[0].data["fromUserId"], "alice");
    }

    #[tokio::test]
    async fn test_request_without_token_is_silent() {
        let f = fixture().await;
        f.store
            .seed(&DocPath::new("users", "bob"), json!({"displayName": "Bob"}))
            .await;

        let outcome = f
            .dispatcher
            .dispatch(MutationEvent::created("connectionRequests/r1", request("pending")))
            .await;
        assert!(matches!(
            outcome,
            DispatchOutcome::Handled {
                outcome: HandlerOutcome::Skipped(_),
                ..
            }
        ));
        assert!(f.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_sender_named_someone() {
        let f = fixture().await;
        f.dispatcher
            .dispatch(MutationEvent::created(
                "connectionRequests/r2",
                json!({"fromUserId": "ghost", "toUserId": "bob", "status": "pending"}),
            ))
            .await;
        assert!(f.notifier.sent()[0].body.starts_with("Someone wants"));
    }

    #[tokio::test]
    async fn test_acceptance_creates_connection_and_chat_once() {
        let f = fixture().await;
        let accept = MutationEvent::updated("connectionRequests/r1", request("pending"), request("accepted"));

        let outcome = f.dispatcher.dispatch(accept.clone()).await;
        assert_eq!(
            outcome,
            DispatchOutcome::Handled {
                handler: "handle_connection_acceptance",
                outcome: HandlerOutcome::Applied
            }
        );

        let connection = f.store.get(&DocPath::new("connections", "r1")).await.unwrap().unwrap();
        let connection: ConnectionDoc = connection.decode().unwrap();
        assert_eq!(connection.user1_id, "alice");
        assert_eq!(connection.user2_id, "bob");
        assert_eq!(connection.status, "active");

        let chat: ChatDoc = f
            .store
            .get(&DocPath::new("chats", "r1"))
            .await
            .unwrap()
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(chat.participants, ["alice".to_string(), "bob".to_string()]);

        let sent = f.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].token, "tok-alice");
        assert_eq!(sent[0].body, "Bob accepted your companion request");
        assert_eq!(sent[0].data["connectionId"], "r1");
        assert_eq!(sent[0].data["companionId"], "bob");

        // Redelivery creates nothing and sends nothing
        let outcome = f.dispatcher.dispatch(accept).await;
        assert!(matches!(
            outcome,
            DispatchOutcome::Handled {
                outcome: HandlerOutcome::Skipped(_),
                ..
            }
        ));
        assert_eq!(f.store.document_count("connections").await, 1);
        assert_eq!(f.store.document_count("chats").await, 1);
        assert_eq!(f.notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_non_acceptance_transitions_do_nothing() {
        let f = fixture().await;
        for (before, after) in [
            ("accepted", "accepted"),
            ("pending", "rejected"),
            ("pending", "pending"),
        ] {
            f.dispatcher
                .dispatch(MutationEvent::updated(
                    "connectionRequests/r1",
                    request(before),
                    request(after),
                ))
                .await;
        }

        assert_eq!(f.store.document_count("connections").await, 0);
        assert_eq!(f.store.document_count("chats").await, 0);
        assert!(f.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_records() {
        let f = fixture().await;
        f.notifier.set_offline(true);

        let outcome = f
            .dispatcher
            .dispatch(MutationEvent::updated(
                "connectionRequests/r9",
                request("pending"),
                request("accepted"),
            ))
            .await;
        assert!(matches!(
            outcome,
            DispatchOutcome::Handled {
                outcome: HandlerOutcome::Applied,
                ..
            }
        ));
        assert_eq!(f.store.document_count("connections").await, 1);
        assert_eq!(f.store.document_count("chats").await, 1);
    }
}
