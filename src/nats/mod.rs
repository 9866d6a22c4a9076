//! NATS connectivity for the document mutation feed

pub mod client;

pub use client::NatsClient;
