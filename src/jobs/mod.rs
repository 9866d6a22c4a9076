//! Scheduled batch jobs
//!
//! Jobs take `now` as a parameter so the scheduler, and tests, control time.
//! Both jobs are safe to re-run: the broadcast re-sends, the cleanup finds
//! nothing left to delete.

pub mod devotion;
pub mod retention;
pub mod scheduler;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::Result;

pub use devotion::DailyDevotionJob;
pub use retention::RetentionCleanupJob;
pub use scheduler::{normalize_cron, spawn_schedule_task, JobSchedule};

/// What a job run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobReport {
    /// No devotion is published for the date
    NoDevotion { date: String },
    DevotionSent {
        devotion_id: String,
        recipients: usize,
        success_count: usize,
        failure_count: usize,
    },
    RetentionSwept { cutoff_millis: i64, deleted: usize },
}

impl fmt::Display for JobReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobReport::NoDevotion { date } => write!(f, "no devotion for {}", date),
            JobReport::DevotionSent {
                devotion_id,
                recipients,
                success_count,
                failure_count,
            } => write!(
                f,
                "devotion {} sent to {} recipients ({} ok, {} failed)",
                devotion_id, recipients, success_count, failure_count
            ),
            JobReport::RetentionSwept {
                cutoff_millis,
                deleted,
            } => write!(f, "deleted {} records older than {}", deleted, cutoff_millis),
        }
    }
}

/// A job the scheduler can run
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, now: DateTime<Utc>) -> Result<JobReport>;
}
