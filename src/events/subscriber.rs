//! NATS mutation feed subscriber
//!
//! Messages are decoded into [`MutationEvent`]s and handed to an
//! [`OrderedDispatcher`]: events for the same document run one at a time in
//! arrival order, events for different documents run in parallel.
//! Malformed messages are logged and dropped.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::events::dispatcher::Dispatcher;
use crate::events::mutation::MutationEvent;
use crate::nats::NatsClient;

/// Worker count for the mutation feed
pub const DEFAULT_SHARDS: usize = 16;

/// Queued events per worker before the feed waits
const SHARD_QUEUE_DEPTH: usize = 256;

/// Decode a feed payload
pub fn decode_message(payload: &[u8]) -> Option<MutationEvent> {
    match MutationEvent::from_slice(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Dropping mutation message: {}", e);
            None
        }
    }
}

/// Worker that owns a document path
pub fn shard_index(document: &str, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    document.hash(&mut hasher);
    (hasher.finish() % shards.max(1) as u64) as usize
}

/// Dispatches events on a fixed set of workers keyed by document path
pub struct OrderedDispatcher {
    shards: Vec<mpsc::Sender<MutationEvent>>,
    workers: JoinSet<usize>,
}

impl OrderedDispatcher {
    pub fn new(dispatcher: Arc<Dispatcher>, shards: usize) -> Self {
        let mut senders = Vec::with_capacity(shards.max(1));
        let mut workers = JoinSet::new();

        for shard in 0..shards.max(1) {
            let (tx, mut rx) = mpsc::channel::<MutationEvent>(SHARD_QUEUE_DEPTH);
            let dispatcher = Arc::clone(&dispatcher);
            workers.spawn(async move {
                let mut handled = 0;
                while let Some(event) = rx.recv().await {
                    let outcome = dispatcher.dispatch(event).await;
                    debug!(shard = shard, "Mutation dispatched: {:?}", outcome);
                    handled += 1;
                }
                handled
            });
            senders.push(tx);
        }

        Self {
            shards: senders,
            workers,
        }
    }

    /// Queue an event behind earlier events for the same document
    pub async fn submit(&self, event: MutationEvent) {
        let shard = shard_index(&event.document, self.shards.len());
        if let Err(e) = self.shards[shard].send(event).await {
            error!(shard = shard, document = %e.0.document, "Mutation worker is gone, event dropped");
        }
    }

    /// Stop accepting events and wait for every queued one to finish
    ///
    /// Returns the number of events handled over the dispatcher's lifetime.
    pub async fn drain(self) -> usize {
        let Self { shards, mut workers } = self;
        drop(shards);

        let mut handled = 0;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(count) => handled += count,
                Err(e) => error!("Mutation worker failed: {}", e),
            }
        }
        handled
    }
}

/// Subscribe to the mutation subject and dispatch until shutdown
pub fn spawn_subscriber_task(
    nats: NatsClient,
    subject: String,
    dispatcher: Arc<Dispatcher>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut subscription = match nats.subscribe(&subject).await {
            Ok(sub) => sub,
            Err(e) => {
                error!(subject = %subject, "Mutation subscriber failed to start: {}", e);
                return;
            }
        };

        info!(subject = %subject, routes = dispatcher.len(), "Mutation subscriber started");
        let ordered = OrderedDispatcher::new(dispatcher, DEFAULT_SHARDS);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Mutation subscriber shutting down");
                    break;
                }
                message = subscription.next() => {
                    let Some(message) = message else {
                        warn!("Mutation subscription closed");
                        break;
                    };
                    if let Some(event) = decode_message(&message.payload) {
                        ordered.submit(event).await;
                    }
                }
            }
        }

        if let Err(e) = subscription.unsubscribe().await {
            warn!("Failed to unsubscribe from {}: {}", subject, e);
        }
        let handled = ordered.drain().await;
        info!(handled = handled, "Mutation subscriber stopped");
    })
}
