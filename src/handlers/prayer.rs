//! Prayer count aggregation
//!
//! Each new `prayerRequests/{requestId}/prayers/{userId}` document bumps the
//! parent's `prayCount` with one atomic increment and stamps `lastPrayedAt`.
//! The count is never read back and rewritten, so N concurrent prayers add
//! exactly N.
//!
//! Redelivery of the same creation increments again. There is no dedup
//! record per event.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::db::schemas::PRAYER_REQUEST_COLLECTION;
use crate::db::{DocPath, DocumentStore, FieldOp};
use crate::events::{EventContext, EventHandler, HandlerOutcome};
use crate::types::Result;

pub struct PrayerCounter {
    store: Arc<dyn DocumentStore>,
}

impl PrayerCounter {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Record one prayer against a request
    pub async fn record_prayer(&self, request_id: &str) -> Result<()> {
        let request = DocPath::new(PRAYER_REQUEST_COLLECTION, request_id);
        self.store
            .update(
                &request,
                vec![
                    FieldOp::increment("prayCount", 1),
                    FieldOp::server_timestamp("lastPrayedAt"),
                ],
            )
            .await
    }
}

#[async_trait]
impl EventHandler for PrayerCounter {
    fn name(&self) -> &'static str {
        "increment_prayer_count"
    }

    async fn handle(&self, ctx: &EventContext) -> Result<HandlerOutcome> {
        let request_id = ctx.params.require("requestId")?;
        self.record_prayer(request_id).await?;

        debug!(
            request_id = request_id,
            user_id = ctx.params.get("userId").unwrap_or_default(),
            "Prayer counted"
        );
        Ok(HandlerOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::PrayerRequestDoc;
    use crate::db::MemoryStore;
    use crate::events::{ChangeKind, DispatchOutcome, Dispatcher, MutationEvent};
    use serde_json::json;

    fn dispatcher(store: Arc<MemoryStore>) -> Arc<Dispatcher> {
        Arc::new(
            Dispatcher::new()
                .route(
                    "prayerRequests/{requestId}/prayers/{userId}",
                    &[ChangeKind::Create],
                    Arc::new(PrayerCounter::new(store)),
                )
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_concurrent_prayers_increment_exactly() {
        let store = Arc::new(MemoryStore::new());
        let request = DocPath::new("prayerRequests", "r1");
        store.seed(&request, json!({"prayCount": 0, "createdAt": 1})).await;
        let dispatcher = dispatcher(store.clone());

        let mut handles = Vec::new();
        for i in 0..25 {
            let dispatcher = Arc::clone(&dispatcher);
            handles.push(tokio::spawn(async move {
                dispatcher
                    .dispatch(MutationEvent::created(
                        format!("prayerRequests/r1/prayers/u{}", i),
                        json!({}),
                    ))
                    .await
            }));
        }
        for handle in handles {
            let outcome = handle.await.unwrap();
            assert!(matches!(outcome, DispatchOutcome::Handled { .. }));
        }

        let doc: PrayerRequestDoc = store.get(&request).await.unwrap().unwrap().decode().unwrap();
        assert_eq!(doc.pray_count, 25);
        assert!(doc.last_prayed_at.is_some());
    }

    #[tokio::test]
    async fn test_missing_field_starts_at_zero() {
        let store = Arc::new(MemoryStore::new());
        let request = DocPath::new("prayerRequests", "r2");
        store.seed(&request, json!({})).await;

        PrayerCounter::new(store.clone()).record_prayer("r2").await.unwrap();
        let doc = store.get(&request).await.unwrap().unwrap();
        assert_eq!(doc.data["prayCount"], json!(1));
    }

    #[tokio::test]
    async fn test_missing_request_fails_without_write() {
        let store = Arc::new(MemoryStore::new());
        let outcome = dispatcher(store.clone())
            .dispatch(MutationEvent::created("prayerRequests/gone/prayers/u1", json!({})))
            .await;
        assert!(matches!(
            outcome,
            DispatchOutcome::Failed {
                handler: "increment_prayer_count",
                ..
            }
        ));
        assert_eq!(store.document_count("prayerRequests").await, 0);
    }

    #[tokio::test]
    async fn test_update_of_prayer_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        let outcome = dispatcher(store.clone())
            .dispatch(MutationEvent::updated(
                "prayerRequests/r1/prayers/u1",
                json!({}),
                json!({"note": "edited"}),
            ))
            .await;
        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert_eq!(store.write_count(), 0);
    }
}
