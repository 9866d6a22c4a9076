//! End-to-end flows through the dispatcher, jobs and RPC against the in-memory store

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value as JsonValue};

use hearth::build_dispatcher;
use hearth::db::schemas::{PrayerRequestDoc, SuggestionSetDoc};
use hearth::db::{DocPath, DocumentStore, MemoryStore, Query};
use hearth::events::{DispatchOutcome, Dispatcher, HandlerOutcome, MutationEvent, OrderedDispatcher};
use hearth::jobs::{DailyDevotionJob, JobReport, RetentionCleanupJob, ScheduledJob};
use hearth::matching::{suggestions_path, MatchingConfig};
use hearth::notify::RecordingNotifier;
use hearth::rpc::{ActivityRecorder, RecordActivityRequest, RpcError};

struct Harness {
    store: Arc<MemoryStore>,
    notifier: Arc<RecordingNotifier>,
    dispatcher: Arc<Dispatcher>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let dispatcher = build_dispatcher(store.clone(), notifier.clone(), MatchingConfig::default())
        .expect("routes register");
    Harness {
        store,
        notifier,
        dispatcher: Arc::new(dispatcher),
    }
}

fn profile(grief_type: &str, stage: &str, allow: bool) -> JsonValue {
    json!({
        "griefType": grief_type,
        "griefStage": stage,
        "allowMatching": allow,
        "displayName": "Friend",
    })
}

async fn suggestions_for(store: &MemoryStore, user_id: &str) -> SuggestionSetDoc {
    store
        .get(&suggestions_path(user_id))
        .await
        .unwrap()
        .expect("suggestion set written")
        .decode()
        .unwrap()
}

fn suggested_ids(set: &SuggestionSetDoc) -> Vec<(&str, u32)> {
    set.suggestions
        .iter()
        .map(|s| (s.user_id.as_str(), s.compatibility_score))
        .collect()
}

#[tokio::test]
async fn test_profile_change_ranks_companions() {
    let h = harness();
    let me = profile("Loss of Parent", "Early Grief", true);
    h.store.seed(&DocPath::new("profiles", "me"), me.clone()).await;
    for (id, stage, allow) in [
        ("same_stage", "Early Grief", true),
        ("accepting", "Acceptance", true),
        ("rebuilding", "Reconstruction", true),
        ("private", "Early Grief", false),
    ] {
        h.store
            .seed(&DocPath::new("profiles", id), profile("Loss of Parent", stage, allow))
            .await;
    }
    h.store
        .seed(
            &DocPath::new("profiles", "other_type"),
            profile("Loss of Child", "Early Grief", true),
        )
        .await;

    let outcome = h
        .dispatcher
        .dispatch(MutationEvent::created("profiles/me", me))
        .await;
    assert!(matches!(
        outcome,
        DispatchOutcome::Handled {
            outcome: HandlerOutcome::Applied,
            ..
        }
    ));

    let set = suggestions_for(&h.store, "me").await;
    assert_eq!(
        suggested_ids(&set),
        vec![("same_stage", 5), ("accepting", 4), ("rebuilding", 3)]
    );
}

#[tokio::test]
async fn test_stage_bonus_depends_on_requester() {
    let h = harness();
    let early = profile("Loss of Spouse", "Early Grief", true);
    let accepting = profile("Loss of Spouse", "Acceptance", true);
    h.store.seed(&DocPath::new("profiles", "early"), early.clone()).await;
    h.store
        .seed(&DocPath::new("profiles", "accepting"), accepting.clone())
        .await;

    h.dispatcher
        .dispatch(MutationEvent::created("profiles/early", early))
        .await;
    h.dispatcher
        .dispatch(MutationEvent::created("profiles/accepting", accepting))
        .await;

    // Acceptance complements Early Grief, not the other way round
    let early_set = suggestions_for(&h.store, "early").await;
    assert_eq!(suggested_ids(&early_set), vec![("accepting", 4)]);
    let accepting_set = suggestions_for(&h.store, "accepting").await;
    assert_eq!(suggested_ids(&accepting_set), vec![("early", 3)]);
}

#[tokio::test]
async fn test_suggestions_capped_and_stable() {
    let h = harness();
    let me = profile("Loss of Sibling", "Acceptance", true);
    h.store.seed(&DocPath::new("profiles", "me"), me.clone()).await;
    for i in 0..8 {
        h.store
            .seed(
                &DocPath::new("profiles", format!("c{:02}", i)),
                profile("Loss of Sibling", "Acceptance", true),
            )
            .await;
    }

    h.dispatcher
        .dispatch(MutationEvent::created("profiles/me", me.clone()))
        .await;
    let first = suggestions_for(&h.store, "me").await;
    assert_eq!(first.suggestions.len(), 5);
    assert!(first.suggestions.iter().all(|s| s.user_id != "me"));

    // Redelivery of the same change rewrites the same ranking
    h.dispatcher
        .dispatch(MutationEvent::updated("profiles/me", me.clone(), me))
        .await;
    let second = suggestions_for(&h.store, "me").await;
    assert_eq!(suggested_ids(&first), suggested_ids(&second));
}

#[tokio::test]
async fn test_latest_profile_wins_through_feed() {
    let h = harness();
    let old = profile("Old", "Acceptance", true);
    let new = profile("New", "Acceptance", true);
    h.store.seed(&DocPath::new("profiles", "me"), new.clone()).await;
    h.store
        .seed(&DocPath::new("profiles", "peer_old"), profile("Old", "Acceptance", true))
        .await;
    h.store
        .seed(&DocPath::new("profiles", "peer_new"), profile("New", "Acceptance", true))
        .await;

    let feed = OrderedDispatcher::new(Arc::clone(&h.dispatcher), 4);
    feed.submit(MutationEvent::created("profiles/me", old.clone())).await;
    feed.submit(MutationEvent::updated("profiles/me", old, new)).await;
    assert_eq!(feed.drain().await, 2);

    let set = suggestions_for(&h.store, "me").await;
    assert_eq!(suggested_ids(&set), vec![("peer_new", 5)]);
}

#[tokio::test]
async fn test_concurrent_prayers_all_counted() {
    let h = harness();
    let request = DocPath::new("prayerRequests", "r1");
    h.store
        .seed(&request, json!({"prayCount": 0, "createdAt": 0}))
        .await;

    let tasks: Vec<_> = (0..30)
        .map(|i| {
            let dispatcher = Arc::clone(&h.dispatcher);
            tokio::spawn(async move {
                dispatcher
                    .dispatch(MutationEvent::created(
                        format!("prayerRequests/r1/prayers/u{}", i),
                        json!({"userId": format!("u{}", i)}),
                    ))
                    .await
            })
        })
        .collect();
    for task in futures::future::join_all(tasks).await {
        assert!(matches!(
            task.unwrap(),
            DispatchOutcome::Handled {
                outcome: HandlerOutcome::Applied,
                ..
            }
        ));
    }

    let doc: PrayerRequestDoc = h.store.get(&request).await.unwrap().unwrap().decode().unwrap();
    assert_eq!(doc.pray_count, 30);
    assert!(doc.last_prayed_at.is_some());
}

#[tokio::test]
async fn test_connection_request_lifecycle() {
    let h = harness();
    h.store
        .seed(
            &DocPath::new("users", "alice"),
            json!({"displayName": "Alice", "pushToken": "tok-alice"}),
        )
        .await;
    h.store
        .seed(
            &DocPath::new("users", "bob"),
            json!({"displayName": "Bob", "pushToken": "tok-bob"}),
        )
        .await;

    let pending = json!({"fromUserId": "alice", "toUserId": "bob", "status": "pending"});
    let accepted = json!({"fromUserId": "alice", "toUserId": "bob", "status": "accepted"});

    h.dispatcher
        .dispatch(MutationEvent::created("connectionRequests/req1", pending.clone()))
        .await;
    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].token, "tok-bob");
    assert!(sent[0].body.contains("Alice"));

    let acceptance = MutationEvent::updated("connectionRequests/req1", pending, accepted);
    let first = h.dispatcher.dispatch(acceptance.clone()).await;
    let redelivered = h.dispatcher.dispatch(acceptance).await;
    assert!(matches!(
        first,
        DispatchOutcome::Handled {
            outcome: HandlerOutcome::Applied,
            ..
        }
    ));
    assert!(matches!(
        redelivered,
        DispatchOutcome::Handled {
            outcome: HandlerOutcome::Skipped(_),
            ..
        }
    ));

    assert_eq!(h.store.document_count("connections").await, 1);
    assert_eq!(h.store.document_count("chats").await, 1);
    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].token, "tok-alice");
}

#[tokio::test]
async fn test_unrouted_mutation_ignored() {
    let h = harness();
    let outcome = h
        .dispatcher
        .dispatch(MutationEvent::created("journals/j1", json!({"text": "today"})))
        .await;
    assert!(matches!(outcome, DispatchOutcome::Ignored));
    assert_eq!(h.store.write_count(), 0);
}

#[test]
fn test_retention_keeps_requests_inside_window() {
    let store = Arc::new(MemoryStore::new());
    let job = RetentionCleanupJob::new(store.clone(), 30);
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 7, 0, 0).unwrap();

    let report = tokio_test::block_on(async {
        store
            .seed(
                &DocPath::new("prayerRequests", "stale"),
                json!({"createdAt": (now - Duration::days(31)).timestamp_millis()}),
            )
            .await;
        store
            .seed(
                &DocPath::new("prayerRequests", "fresh"),
                json!({"createdAt": (now - Duration::days(30) + Duration::seconds(1)).timestamp_millis()}),
            )
            .await;
        job.run(now).await
    });

    assert!(matches!(report, Ok(JobReport::RetentionSwept { deleted: 1, .. })));
    let remaining = tokio_test::block_on(store.query("prayerRequests", &Query::new())).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id(), "fresh");
}

#[tokio::test]
async fn test_retention_with_nothing_old_writes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    store
        .seed(
            &DocPath::new("prayerRequests", "new"),
            json!({"createdAt": now.timestamp_millis()}),
        )
        .await;
    let writes_before = store.write_count();

    let report = tokio_test::assert_ok!(RetentionCleanupJob::new(store.clone(), 30).run(now).await);
    assert!(matches!(report, JobReport::RetentionSwept { deleted: 0, .. }));
    assert_eq!(store.write_count(), writes_before);
}

#[tokio::test]
async fn test_devotion_missing_sends_nothing() {
    let h = harness();
    h.store
        .seed(
            &DocPath::new("users", "u1"),
            json!({"pushToken": "t1", "preferences": {"dailyDevotion": true}}),
        )
        .await;
    let job = DailyDevotionJob::new(h.store.clone(), h.notifier.clone(), chrono_tz::America::New_York);

    let report = tokio_test::assert_ok!(job.run(Utc::now()).await);
    assert!(matches!(report, JobReport::NoDevotion { .. }));
    assert!(h.notifier.multicasts().is_empty());
}

#[tokio::test]
async fn test_activity_requires_caller() {
    let store = Arc::new(MemoryStore::new());
    store.seed(&DocPath::new("users", "u1"), json!({})).await;
    let writes_before = store.write_count();
    let recorder = ActivityRecorder::new(store.clone());

    let result = recorder
        .record_activity(
            None,
            RecordActivityRequest {
                action: "opened_app".to_string(),
                metadata: None,
            },
            Utc::now(),
        )
        .await;

    assert!(matches!(result, Err(RpcError::Unauthenticated(_))));
    assert_eq!(store.write_count(), writes_before);
    assert_eq!(store.document_count("userActivity/u1/activities").await, 0);
}
