//! Retention cleanup for old prayer requests
//!
//! Deletes every prayer request created strictly before `now - retention`
//! in one atomic batch. Nothing matching means nothing is committed.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::info;

use crate::db::schemas::PRAYER_REQUEST_COLLECTION;
use crate::db::{DocumentStore, Query};
use crate::jobs::{JobReport, ScheduledJob};
use crate::types::Result;

pub const DEFAULT_RETENTION_DAYS: i64 = 30;

pub struct RetentionCleanupJob {
    store: Arc<dyn DocumentStore>,
    retention: Duration,
}

impl RetentionCleanupJob {
    pub fn new(store: Arc<dyn DocumentStore>, retention_days: i64) -> Self {
        Self {
            store,
            retention: Duration::days(retention_days),
        }
    }

    /// Records created before this instant are deleted
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.retention
    }
}

#[async_trait]
impl ScheduledJob for RetentionCleanupJob {
    fn name(&self) -> &'static str {
        "retention_cleanup"
    }

    async fn run(&self, now: DateTime<Utc>) -> Result<JobReport> {
        let cutoff_millis = self.cutoff(now).timestamp_millis();
        let query = Query::new().where_lt("createdAt", json!(cutoff_millis));

        let paths = self
            .store
            .query(PRAYER_REQUEST_COLLECTION, &query)
            .await?
            .into_iter()
            .map(|doc| doc.path)
            .collect::<Vec<_>>();

        let deleted = self.store.batch_delete(paths).await?;
        info!("Cleaned up {} old prayer requests", deleted);

        Ok(JobReport::RetentionSwept {
            cutoff_millis,
            deleted,
        })
    }
}
