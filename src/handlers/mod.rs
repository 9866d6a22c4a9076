//! Reactive handlers and the route table that binds them
//!
//! | Handler                        | Template                                      | Kinds                  |
//! |--------------------------------|-----------------------------------------------|------------------------|
//! | `suggest_companions`           | `profiles/{userId}`                           | create, update, delete |
//! | `increment_prayer_count`       | `prayerRequests/{requestId}/prayers/{userId}` | create                 |
//! | `notify_connection_request`    | `connectionRequests/{requestId}`              | create                 |
//! | `handle_connection_acceptance` | `connectionRequests/{requestId}`              | update                 |

pub mod connection;
pub mod prayer;

use std::sync::Arc;

use crate::db::DocumentStore;
use crate::events::{ChangeKind, Dispatcher};
use crate::matching::{MatchingConfig, SuggestionPipeline};
use crate::notify::PushNotifier;
use crate::types::Result;

pub use connection::{ConnectionAcceptanceHandler, ConnectionRequestNotifier};
pub use prayer::PrayerCounter;

pub const PROFILE_TEMPLATE: &str = "profiles/{userId}";
pub const PRAYER_TEMPLATE: &str = "prayerRequests/{requestId}/prayers/{userId}";
pub const CONNECTION_REQUEST_TEMPLATE: &str = "connectionRequests/{requestId}";

/// Build the dispatcher with every handler registered
pub fn build_dispatcher(
    store: Arc<dyn DocumentStore>,
    notifier: Arc<dyn PushNotifier>,
    matching: MatchingConfig,
) -> Result<Dispatcher> {
    Dispatcher::new()
        .route(
            PROFILE_TEMPLATE,
            &[ChangeKind::Create, ChangeKind::Update, ChangeKind::Delete],
            Arc::new(SuggestionPipeline::new(store.clone(), matching)),
        )?
        .route(
            PRAYER_TEMPLATE,
            &[ChangeKind::Create],
            Arc::new(PrayerCounter::new(store.clone())),
        )?
        .route(
            CONNECTION_REQUEST_TEMPLATE,
            &[ChangeKind::Create],
            Arc::new(ConnectionRequestNotifier::new(store.clone(), notifier.clone())),
        )?
        .route(
            CONNECTION_REQUEST_TEMPLATE,
            &[ChangeKind::Update],
            Arc::new(ConnectionAcceptanceHandler::new(store, notifier)),
        )
}
