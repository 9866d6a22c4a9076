//! Hearth - reactive event core for the grief companion app

use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hearth::{
    auth::JwtValidator,
    build_dispatcher,
    config::{Args, LogFormat},
    db::{DocumentStore, MemoryStore, MongoClient, MongoStore},
    events::spawn_subscriber_task,
    jobs::{spawn_schedule_task, DailyDevotionJob, JobSchedule, RetentionCleanupJob},
    nats::NatsClient,
    notify::{FcmConfig, FcmNotifier, LogNotifier, PushNotifier},
    rpc::ActivityRecorder,
    server::{self, AppState},
};

fn init_tracing(log_level: &str, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("hearth={},info", log_level).into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(&args.log_level, args.log_format);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Hearth - companion event core");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("NATS: {} ({})", args.nats.nats_url, args.mutation_subject);
    info!("MongoDB: {} / {}", args.mongodb_uri, args.mongodb_db);
    info!("Devotion: {} ({})", args.devotion_cron, args.schedule_timezone);
    info!("Cleanup: {} (retention {} days)", args.cleanup_cron, args.retention_days);
    info!(
        "Suggestions: {} candidates, {} kept",
        args.suggestion_candidate_limit, args.suggestion_max_results
    );
    info!("======================================");

    // Document store: MongoDB, or in-memory in dev mode
    let store: Arc<dyn DocumentStore> = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            let mongo = MongoStore::new(client);
            if let Err(e) = mongo.ensure_indexes().await {
                warn!("Index creation failed: {}", e);
            }
            Arc::new(mongo)
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, using in-memory store): {}", e);
                Arc::new(MemoryStore::new())
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    // Push transport: FCM when configured, logging otherwise (dev mode only)
    let notifier: Arc<dyn PushNotifier> =
        match (&args.fcm.fcm_project_id, &args.fcm.fcm_access_token) {
            (Some(project_id), Some(token)) => {
                let config = FcmConfig::new(project_id.as_str(), token.as_str())
                    .with_endpoint(args.fcm.fcm_endpoint.as_str());
                Arc::new(FcmNotifier::new(config)?)
            }
            _ => {
                warn!("FCM not configured, notifications will only be logged");
                Arc::new(LogNotifier)
            }
        };

    let jwt = match &args.jwt_secret {
        Some(secret) => JwtValidator::new(secret.clone(), args.jwt_expiry_seconds)?,
        None => {
            warn!("JWT_SECRET not set, using the dev secret");
            JwtValidator::new_dev()
        }
    };

    let dispatcher = Arc::new(build_dispatcher(
        Arc::clone(&store),
        Arc::clone(&notifier),
        args.matching(),
    )?);

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut tasks = Vec::new();

    // Mutation feed (optional in dev mode)
    match NatsClient::new(&args.nats, "hearth").await {
        Ok(nats) => {
            info!("NATS client '{}' connected", nats.name());
            tasks.push(spawn_subscriber_task(
                nats,
                args.mutation_subject.clone(),
                Arc::clone(&dispatcher),
                shutdown_tx.subscribe(),
            ));
        }
        Err(e) => {
            if args.dev_mode {
                warn!("NATS connection failed (dev mode, no mutation feed): {}", e);
            } else {
                error!("NATS connection failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    // Scheduled jobs
    let devotion_schedule = JobSchedule::parse(&args.devotion_cron, &args.schedule_timezone)?;
    let cleanup_schedule = JobSchedule::parse(&args.cleanup_cron, &args.schedule_timezone)?;
    let devotion_job = DailyDevotionJob::new(
        Arc::clone(&store),
        Arc::clone(&notifier),
        devotion_schedule.timezone(),
    );
    tasks.push(spawn_schedule_task(
        Arc::new(devotion_job),
        devotion_schedule,
        shutdown_tx.subscribe(),
    ));
    tasks.push(spawn_schedule_task(
        Arc::new(RetentionCleanupJob::new(Arc::clone(&store), args.retention_days)),
        cleanup_schedule,
        shutdown_tx.subscribe(),
    ));

    // RPC surface
    let state = Arc::new(AppState::new(
        ActivityRecorder::new(Arc::clone(&store)),
        jwt,
        args.dev_mode,
    ));
    let server_shutdown = shutdown_tx.subscribe();
    let listen = args.listen;
    let server_task = tokio::spawn(async move { server::run(listen, state, server_shutdown).await });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    let _ = shutdown_tx.send(());

    match server_task.await {
        Ok(Err(e)) => error!("HTTP server error: {}", e),
        Err(e) => error!("HTTP server task failed: {}", e),
        Ok(Ok(())) => {}
    }
    for task in tasks {
        if let Err(e) = task.await {
            error!("Background task failed: {}", e);
        }
    }

    info!("Hearth stopped");
    Ok(())
}
