//! Configuration for Hearth
//!
//! CLI arguments and environment variable handling using clap.

use std::net::SocketAddr;

use clap::{Parser, ValueEnum};

use crate::jobs::JobSchedule;
use crate::matching::MatchingConfig;
use crate::notify::fcm::DEFAULT_FCM_ENDPOINT;

/// Hearth - reactive event core for the grief companion app
#[derive(Parser, Debug, Clone)]
#[command(name = "hearth")]
#[command(about = "Reacts to document mutations and runs scheduled jobs for the companion app")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8090")]
    pub listen: SocketAddr,

    /// Enable development mode (in-memory store, logged notifications, dev JWT secret)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// NATS configuration
    #[command(flatten)]
    pub nats: NatsArgs,

    /// NATS subject carrying document mutation events
    #[arg(long, env = "MUTATION_SUBJECT", default_value = "store.mutations.>")]
    pub mutation_subject: String,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "hearth")]
    pub mongodb_db: String,

    /// JWT secret for verifying caller tokens (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "3600")]
    pub jwt_expiry_seconds: u64,

    /// Push notification transport
    #[command(flatten)]
    pub fcm: FcmArgs,

    /// Cron expression for the daily devotion broadcast
    #[arg(long, env = "DEVOTION_CRON", default_value = "0 8 * * *")]
    pub devotion_cron: String,

    /// Cron expression for prayer request retention cleanup
    #[arg(long, env = "CLEANUP_CRON", default_value = "0 2 * * Sun")]
    pub cleanup_cron: String,

    /// IANA time zone for job schedules and the devotion date
    #[arg(long, env = "SCHEDULE_TIMEZONE", default_value = "America/New_York")]
    pub schedule_timezone: String,

    /// Prayer requests older than this many days are deleted
    #[arg(long, env = "RETENTION_DAYS", default_value = "30")]
    pub retention_days: i64,

    /// Candidate profiles scored per suggestion recompute
    #[arg(long, env = "SUGGESTION_CANDIDATE_LIMIT", default_value = "10")]
    pub suggestion_candidate_limit: usize,

    /// Suggestions kept per user
    #[arg(long, env = "SUGGESTION_MAX_RESULTS", default_value = "5")]
    pub suggestion_max_results: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

/// Log output format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// NATS connection arguments
#[derive(Parser, Debug, Clone)]
pub struct NatsArgs {
    /// NATS server URL
    #[arg(long, env = "NATS_URL", default_value = "nats://127.0.0.1:4222")]
    pub nats_url: String,

    /// NATS username (optional)
    #[arg(long, env = "NATS_USER")]
    pub nats_user: Option<String>,

    /// NATS password (optional)
    #[arg(long, env = "NATS_PASSWORD")]
    pub nats_password: Option<String>,
}

/// Firebase Cloud Messaging arguments
#[derive(Parser, Debug, Clone)]
pub struct FcmArgs {
    /// Firebase project id
    #[arg(long, env = "FCM_PROJECT_ID")]
    pub fcm_project_id: Option<String>,

    /// OAuth2 access token for the FCM service account
    #[arg(long, env = "FCM_ACCESS_TOKEN")]
    pub fcm_access_token: Option<String>,

    /// FCM API base URL
    #[arg(long, env = "FCM_ENDPOINT", default_value = DEFAULT_FCM_ENDPOINT)]
    pub fcm_endpoint: String,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            if self.jwt_secret.is_none() {
                return Err("JWT_SECRET is required in production mode".to_string());
            }
            if self.fcm.fcm_project_id.is_none() || self.fcm.fcm_access_token.is_none() {
                return Err(
                    "FCM_PROJECT_ID and FCM_ACCESS_TOKEN are required in production mode"
                        .to_string(),
                );
            }
        }

        for (name, expression) in [
            ("DEVOTION_CRON", &self.devotion_cron),
            ("CLEANUP_CRON", &self.cleanup_cron),
        ] {
            JobSchedule::parse(expression, &self.schedule_timezone)
                .map_err(|e| format!("{}: {}", name, e))?;
        }

        if self.retention_days <= 0 {
            return Err("RETENTION_DAYS must be positive".to_string());
        }

        if self.suggestion_candidate_limit == 0 || self.suggestion_max_results == 0 {
            return Err(
                "SUGGESTION_CANDIDATE_LIMIT and SUGGESTION_MAX_RESULTS must be positive"
                    .to_string(),
            );
        }

        Ok(())
    }

    pub fn matching(&self) -> MatchingConfig {
        MatchingConfig {
            candidate_limit: self.suggestion_candidate_limit,
            max_suggestions: self.suggestion_max_results,
        }
    }
}
