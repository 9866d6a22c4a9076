//! Hearth - reactive event core for the grief companion app
//!
//! Hearth listens to document mutations from the shared store and derives
//! state and notifications from them, and runs the app's scheduled jobs.
//!
//! ## Services
//!
//! - **Events**: path-template dispatcher fed by a NATS mutation subscriber
//! - **Matching**: compatibility scoring and companion suggestion sets
//! - **Prayer counts**: atomic aggregation of prayers per request
//! - **Connections**: request notification and acceptance state machine
//! - **Jobs**: daily devotion broadcast and prayer request retention cleanup
//! - **RPC**: activity recording over HTTP

pub mod auth;
pub mod config;
pub mod db;
pub mod events;
pub mod handlers;
pub mod jobs;
pub mod matching;
pub mod nats;
pub mod notify;
pub mod rpc;
pub mod server;
pub mod types;

pub use config::Args;
pub use handlers::build_dispatcher;
pub use server::{run, AppState};
pub use types::{HearthError, Result};
