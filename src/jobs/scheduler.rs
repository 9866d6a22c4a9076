//! Cron scheduling for jobs
//!
//! Expressions use the 5-field `min hour dom mon dow` form or the 6-field
//! form with a leading seconds field. Fire times are computed in the job's
//! IANA time zone, so `0 8 * * *` means 08:00 local time across DST changes.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::jobs::ScheduledJob;
use crate::types::{HearthError, Result};

/// Normalize a 5-field expression to the 6-field form the cron crate parses
pub fn normalize_cron(expression: &str) -> Result<String> {
    let fields = expression.split_whitespace().count();
    match fields {
        5 => Ok(format!("0 {}", expression.trim())),
        6 => Ok(expression.trim().to_string()),
        _ => Err(HearthError::Config(format!(
            "cron expression must have 5 fields (min..dow) or 6 fields (sec..dow): {}",
            expression
        ))),
    }
}

/// A parsed cron expression bound to a time zone
#[derive(Debug, Clone)]
pub struct JobSchedule {
    expression: String,
    schedule: Schedule,
    tz: Tz,
}

impl JobSchedule {
    pub fn parse(expression: &str, timezone: &str) -> Result<Self> {
        let normalized = normalize_cron(expression)?;
        let schedule = Schedule::from_str(&normalized).map_err(|e| {
            HearthError::Config(format!("invalid cron expression '{}': {}", expression, e))
        })?;
        let tz: Tz = timezone
            .parse()
            .map_err(|_| HearthError::Config(format!("invalid timezone: {}", timezone)))?;

        Ok(Self {
            expression: expression.to_string(),
            schedule,
            tz,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Next fire time strictly after `now`
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&now.with_timezone(&self.tz))
            .next()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Run a job on its schedule until shutdown
///
/// Errors are logged and the job stays scheduled.
pub fn spawn_schedule_task(
    job: Arc<dyn ScheduledJob>,
    schedule: JobSchedule,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            job = job.name(),
            cron = schedule.expression(),
            timezone = %schedule.timezone(),
            "Job scheduled"
        );

        loop {
            let now = Utc::now();
            let Some(next) = schedule.next_after(now) else {
                warn!(job = job.name(), "Schedule has no future fire times");
                break;
            };
            let wait = (next - now).to_std().unwrap_or_default();

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(job = job.name(), "Job scheduler shutting down");
                    break;
                }
                _ = tokio::time::sleep(wait) => {
                    match job.run(Utc::now()).await {
                        Ok(report) => info!(job = job.name(), "Job finished: {}", report),
                        Err(e) => error!(job = job.name(), "Job failed: {}", e),
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_cron("0 8 * * *").unwrap(), "0 0 8 * * *");
        assert_eq!(normalize_cron("30 0 8 * * *").unwrap(), "30 0 8 * * *");
        assert!(normalize_cron("* * *").is_err());
    }

    #[test]
    fn test_daily_fire_time_in_zone() {
        let schedule = JobSchedule::parse("0 8 * * *", "America/New_York").unwrap();
        // 2026-01-10 12:00 UTC is 07:00 EST; next fire is 08:00 EST = 13:00 UTC
        let now = Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap();
        assert_eq!(
            schedule.next_after(now),
            Some(Utc.with_ymd_and_hms(2026, 1, 10, 13, 0, 0).unwrap())
        );

        // Summer time: 08:00 EDT = 12:00 UTC
        let now = Utc.with_ymd_and_hms(2026, 7, 10, 12, 30, 0).unwrap();
        assert_eq!(
            schedule.next_after(now),
            Some(Utc.with_ymd_and_hms(2026, 7, 11, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_weekly_cleanup_runs_on_sunday() {
        let schedule = JobSchedule::parse("0 2 * * Sun", "America/New_York").unwrap();
        // Wednesday 2026-01-07
        let now = Utc.with_ymd_and_hms(2026, 1, 7, 12, 0, 0).unwrap();
        let next = schedule.next_after(now).unwrap();
        // Sunday 2026-01-11 02:00 EST = 07:00 UTC
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 11, 7, 0, 0).unwrap());
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(JobSchedule::parse("0 8 * * *", "Mars/Olympus").is_err());
        assert!(JobSchedule::parse("61 8 * * *", "UTC").is_err());
    }
}
