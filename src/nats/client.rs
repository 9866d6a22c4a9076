//! NATS connection for the mutation feed
//!
//! Startup fails fast when the server is unreachable; after the first
//! connect, async-nats reconnects on its own and resubscribes.

use std::time::Duration;

use async_nats::{Client, ConnectOptions, Subscriber};
use tracing::info;

use crate::config::NatsArgs;
use crate::types::{HearthError, Result};

const PING_INTERVAL: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct NatsClient {
    client: Client,
    name: String,
}

fn connect_options(args: &NatsArgs, name: &str) -> ConnectOptions {
    let options = ConnectOptions::new()
        .name(name)
        .ping_interval(PING_INTERVAL)
        .connection_timeout(CONNECT_TIMEOUT);

    match (&args.nats_user, &args.nats_password) {
        (Some(user), Some(password)) => options.user_and_password(user.clone(), password.clone()),
        _ => options,
    }
}

impl NatsClient {
    /// Connect under a client name shown in server monitoring
    pub async fn new(args: &NatsArgs, name: &str) -> Result<Self> {
        let client = connect_options(args, name)
            .connect(&args.nats_url)
            .await
            .map_err(|e| HearthError::Nats(format!("connect to {} failed: {}", args.nats_url, e)))?;

        info!(url = %args.nats_url, client = name, "Connected to NATS");
        Ok(Self {
            client,
            name: name.to_string(),
        })
    }

    /// Core (non-JetStream) subscription; the producer owns redelivery
    pub async fn subscribe(&self, subject: &str) -> Result<Subscriber> {
        self.client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| HearthError::Nats(format!("subscribe to {} failed: {}", subject, e)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
