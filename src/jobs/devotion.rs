//! Daily devotion broadcast
//!
//! Looks up today's devotion (date computed in the schedule time zone) and
//! multicasts it to every user who opted in and has a push token. Tokens go
//! out in chunks of [`MAX_MULTICAST_TOKENS`]. A failed chunk is logged and
//! counted as failures; the remaining chunks still go out.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::json;
use tracing::{info, warn};

use crate::db::schemas::{
    DevotionDoc, UserDoc, DEVOTION_COLLECTION, DEVOTION_DATE_FORMAT, USER_COLLECTION,
};
use crate::db::{DocumentStore, Query};
use crate::jobs::{JobReport, ScheduledJob};
use crate::notify::{
    notification_data, MulticastMessage, MulticastResponse, PushNotifier, MAX_MULTICAST_TOKENS,
};
use crate::types::Result;

pub const DEVOTION_TITLE: &str = "Daily Devotion";

pub struct DailyDevotionJob {
    store: Arc<dyn DocumentStore>,
    notifier: Arc<dyn PushNotifier>,
    tz: Tz,
}

impl DailyDevotionJob {
    pub fn new(store: Arc<dyn DocumentStore>, notifier: Arc<dyn PushNotifier>, tz: Tz) -> Self {
        Self {
            store,
            notifier,
            tz,
        }
    }

    /// `YYYY-MM-DD` for `now` in the job's time zone
    pub fn local_date(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.tz)
            .format(DEVOTION_DATE_FORMAT)
            .to_string()
    }

    async fn subscriber_tokens(&self) -> Result<Vec<String>> {
        let query = Query::new().where_eq("preferences.dailyDevotion", json!(true));
        let users = self.store.query(USER_COLLECTION, &query).await?;

        Ok(users
            .iter()
            .filter_map(|doc| match doc.decode::<UserDoc>() {
                Ok(user) => user.token().map(String::from),
                Err(e) => {
                    warn!(user_id = doc.id(), "Skipping unreadable user: {}", e);
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl ScheduledJob for DailyDevotionJob {
    fn name(&self) -> &'static str {
        "daily_devotion"
    }

    async fn run(&self, now: DateTime<Utc>) -> Result<JobReport> {
        let today = self.local_date(now);
        let query = Query::new().where_eq("date", json!(today)).limit(1);
        let Some(doc) = self.store.query(DEVOTION_COLLECTION, &query).await?.into_iter().next() else {
            info!("No devotion found for {}", today);
            return Ok(JobReport::NoDevotion { date: today });
        };

        let devotion: DevotionDoc = doc.decode()?;
        let tokens = self.subscriber_tokens().await?;
        let recipients = tokens.len();

        let mut total = MulticastResponse::default();
        if !tokens.is_empty() {
            let message = MulticastMessage {
                tokens,
                title: DEVOTION_TITLE.to_string(),
                body: devotion.title,
                data: notification_data([("type", "daily_devotion"), ("devotionId", doc.id())]),
            };

            for chunk in message.chunks(MAX_MULTICAST_TOKENS) {
                let size = chunk.tokens.len();
                match self.notifier.send_multicast(chunk).await {
                    Ok(response) => total.merge(response),
                    Err(e) => {
                        warn!(chunk_size = size, "Devotion multicast failed: {}", e);
                        total.failure_count += size;
                    }
                }
            }

            info!(
                "Sent daily devotion notifications to {} users",
                total.success_count
            );
        }

        Ok(JobReport::DevotionSent {
            devotion_id: doc.id().to_string(),
            recipients,
            success_count: total.success_count,
            failure_count: total.failure_count,
        })
    }
}
