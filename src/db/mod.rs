//! Document store layer
//!
//! - `store`: the injected [`DocumentStore`] trait, queries and write batches
//! - `memory`: process-local store for tests and dev mode
//! - `mongo`: MongoDB backend
//! - `schemas`: typed document structs and index definitions

pub mod memory;
pub mod mongo;
pub mod path;
pub mod schemas;
pub mod store;

pub use memory::MemoryStore;
pub use mongo::{MongoClient, MongoStore};
pub use path::DocPath;
pub use store::{Document, DocumentStore, FieldOp, FilterOp, Query, Write, WriteBatch};
