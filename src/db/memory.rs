//! In-memory document store
//!
//! Used by tests and dev mode. A single write lock around all collections
//! makes every `update` and `commit` atomic, which is enough to model the
//! store's atomic increment and batch primitives.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;
use tracing::debug;

use crate::db::path::{collection_key, DocPath};
use crate::db::store::{
    apply_field_ops, Document, DocumentStore, FieldOp, Query, Write, WriteBatch,
};
use crate::types::{HearthError, Result};

/// Collection path → (document id → body)
type Collections = HashMap<String, BTreeMap<String, JsonValue>>;

/// Simple in-memory document store
pub struct MemoryStore {
    collections: RwLock<Collections>,
    /// Collection keys whose writes fail (test failure injection)
    failing: RwLock<HashSet<String>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            failing: RwLock::new(HashSet::new()),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Insert a document without counting it as a write
    pub async fn seed(&self, path: &DocPath, data: JsonValue) {
        self.collections
            .write()
            .await
            .entry(path.collection().to_string())
            .or_default()
            .insert(path.id().to_string(), data);
    }

    /// Make every write to collections of this kind fail
    ///
    /// `users/u1/suggestions` fails writes to every `users/*/suggestions`.
    pub async fn fail_writes_to(&self, collection: &str) {
        self.failing.write().await.insert(collection_key(collection));
    }

    /// Number of documents currently in a collection path
    pub async fn document_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    /// Documents written (set, update, add, batch writes) so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Point reads and queries served so far
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    async fn check_writable(&self, path: &DocPath) -> Result<()> {
        let key = path.collection_key();
        if self.failing.read().await.contains(&key) {
            return Err(HearthError::Database(format!(
                "injected write failure for {}",
                path
            )));
        }
        Ok(())
    }

    fn now_millis() -> i64 {
        Utc::now().timestamp_millis()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn existing<'a>(collections: &'a Collections, path: &DocPath) -> Option<&'a JsonValue> {
    collections.get(path.collection())?.get(path.id())
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let collections = self.collections.read().await;
        Ok(existing(&collections, path).map(|data| Document::new(path.clone(), data.clone())))
    }

    async fn set(&self, path: &DocPath, data: JsonValue) -> Result<()> {
        self.check_writable(path).await?;
        self.collections
            .write()
            .await
            .entry(path.collection().to_string())
            .or_default()
            .insert(path.id().to_string(), data);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update(&self, path: &DocPath, ops: Vec<FieldOp>) -> Result<()> {
        self.check_writable(path).await?;
        let mut collections = self.collections.write().await;
        let data = collections
            .get_mut(path.collection())
            .and_then(|c| c.get_mut(path.id()))
            .ok_or_else(|| HearthError::NotFound(path.to_string()))?;

        apply_field_ops(data, &ops, Self::now_millis());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn add(&self, collection: &str, data: JsonValue) -> Result<DocPath> {
        let path = DocPath::new(collection, uuid::Uuid::new_v4().simple().to_string());
        self.set(&path, data).await?;
        Ok(path)
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(docs
            .iter()
            .filter(|(_, data)| query.matches(data))
            .take(limit)
            .map(|(id, data)| Document::new(DocPath::new(collection, id.clone()), data.clone()))
            .collect())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        for write in batch.writes() {
            self.check_writable(write.path()).await?;
        }

        let mut collections = self.collections.write().await;

        // Validate against current state before touching anything
        for write in batch.writes() {
            match write {
                Write::Create { path, .. } if existing(&collections, path).is_some() => {
                    return Err(HearthError::AlreadyExists(path.to_string()));
                }
                Write::Update { path, .. } if existing(&collections, path).is_none() => {
                    return Err(HearthError::NotFound(path.to_string()));
                }
                _ => {}
            }
        }

        let count = batch.len();
        let now = Self::now_millis();
        for write in batch.into_writes() {
            match write {
                Write::Create { path, data } | Write::Set { path, data } => {
                    collections
                        .entry(path.collection().to_string())
                        .or_default()
                        .insert(path.id().to_string(), data);
                }
                Write::Update { path, ops } => {
                    if let Some(data) = collections
                        .get_mut(path.collection())
                        .and_then(|c| c.get_mut(path.id()))
                    {
                        apply_field_ops(data, &ops, now);
                    }
                }
                Write::Delete { path } => {
                    if let Some(docs) = collections.get_mut(path.collection()) {
                        docs.remove(path.id());
                    }
                }
            }
        }

        self.writes.fetch_add(count, Ordering::SeqCst);
        debug!(writes = count, "Committed batch");
        Ok(())
    }
}
