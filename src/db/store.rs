//! Document store abstraction
//!
//! Every handler and job receives an `Arc<dyn DocumentStore>` instead of a
//! process-wide database handle. The trait is the minimal surface the event
//! core needs: point reads, whole-document writes, field-level atomic
//! updates, filtered queries and an all-or-nothing write batch.

use std::cmp::Ordering;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};

use crate::db::path::DocPath;
use crate::types::{HearthError, Result};

/// A stored document with its path
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: DocPath,
    pub data: JsonValue,
}

impl Document {
    pub fn new(path: DocPath, data: JsonValue) -> Self {
        Self { path, data }
    }

    /// Document id (last path segment)
    pub fn id(&self) -> &str {
        self.path.id()
    }

    /// Look up a dotted field (`preferences.dailyDevotion`)
    pub fn field(&self, field: &str) -> Option<&JsonValue> {
        lookup_field(&self.data, field)
    }

    /// Decode the document body into a schema type
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            HearthError::InvalidDocument(format!("{}: {}", self.path, e))
        })
    }
}

/// Field-level operation applied atomically by [`DocumentStore::update`]
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    /// Overwrite one field
    Set { field: String, value: JsonValue },
    /// Add `by` to a numeric field (missing or non-numeric fields start at 0)
    Increment { field: String, by: i64 },
    /// Set a field to the store's current time in epoch milliseconds
    ServerTimestamp { field: String },
}

impl FieldOp {
    pub fn set(field: impl Into<String>, value: JsonValue) -> Self {
        Self::Set {
            field: field.into(),
            value,
        }
    }

    pub fn increment(field: impl Into<String>, by: i64) -> Self {
        Self::Increment {
            field: field.into(),
            by,
        }
    }

    pub fn server_timestamp(field: impl Into<String>) -> Self {
        Self::ServerTimestamp {
            field: field.into(),
        }
    }
}

/// Comparison used by a query filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Lt,
}

/// One `field <op> value` condition
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: JsonValue,
}

impl Filter {
    /// Whether a document body satisfies this filter
    ///
    /// Missing fields never match. `Lt` compares numbers numerically and
    /// strings lexically; mixed types never match.
    pub fn matches(&self, data: &JsonValue) -> bool {
        let Some(actual) = lookup_field(data, &self.field) else {
            return false;
        };

        match self.op {
            FilterOp::Eq => values_equal(actual, &self.value),
            FilterOp::Lt => compare_values(actual, &self.value) == Some(Ordering::Less),
        }
    }
}

/// Filtered collection query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: JsonValue) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op: FilterOp::Eq,
            value,
        });
        self
    }

    pub fn where_lt(mut self, field: impl Into<String>, value: JsonValue) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op: FilterOp::Lt,
            value,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, data: &JsonValue) -> bool {
        self.filters.iter().all(|f| f.matches(data))
    }
}

/// One write inside a [`WriteBatch`]
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Create a document; the whole batch fails if it already exists
    Create { path: DocPath, data: JsonValue },
    /// Overwrite a document
    Set { path: DocPath, data: JsonValue },
    /// Apply field operations to an existing document
    Update { path: DocPath, ops: Vec<FieldOp> },
    /// Delete a document (missing documents are not an error)
    Delete { path: DocPath },
}

impl Write {
    pub fn path(&self) -> &DocPath {
        match self {
            Write::Create { path, .. }
            | Write::Set { path, .. }
            | Write::Update { path, .. }
            | Write::Delete { path } => path,
        }
    }
}

/// Writes committed all-or-nothing by [`DocumentStore::commit`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, path: DocPath, data: JsonValue) -> &mut Self {
        self.writes.push(Write::Create { path, data });
        self
    }

    pub fn set(&mut self, path: DocPath, data: JsonValue) -> &mut Self {
        self.writes.push(Write::Set { path, data });
        self
    }

    pub fn update(&mut self, path: DocPath, ops: Vec<FieldOp>) -> &mut Self {
        self.writes.push(Write::Update { path, ops });
        self
    }

    pub fn delete(&mut self, path: DocPath) -> &mut Self {
        self.writes.push(Write::Delete { path });
        self
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }
}

/// Injected document store capability
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read one document
    async fn get(&self, path: &DocPath) -> Result<Option<Document>>;

    /// Overwrite a whole document, creating it if needed
    async fn set(&self, path: &DocPath, data: JsonValue) -> Result<()>;

    /// Apply field operations atomically to an existing document
    ///
    /// Fails with [`HearthError::NotFound`] when the document is missing.
    async fn update(&self, path: &DocPath, ops: Vec<FieldOp>) -> Result<()>;

    /// Create a document with a generated id in `collection`
    async fn add(&self, collection: &str, data: JsonValue) -> Result<DocPath>;

    /// Query a collection; results come back in ascending id order
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>>;

    /// Commit a batch of writes all-or-nothing
    async fn commit(&self, batch: WriteBatch) -> Result<()>;

    /// Delete documents in one atomic batch, returning how many were submitted
    async fn batch_delete(&self, paths: Vec<DocPath>) -> Result<usize> {
        if paths.is_empty() {
            return Ok(0);
        }

        let count = paths.len();
        let mut batch = WriteBatch::new();
        for path in paths {
            batch.delete(path);
        }
        self.commit(batch).await?;
        Ok(count)
    }
}

// ============================================================================
// JSON helpers shared by the store backends
// ============================================================================

/// Resolve a dotted field path inside a JSON object
pub fn lookup_field<'a>(data: &'a JsonValue, field: &str) -> Option<&'a JsonValue> {
    field
        .split('.')
        .try_fold(data, |current, segment| current.as_object()?.get(segment))
}

/// Set a dotted field path, creating intermediate maps
pub fn set_field(data: &mut JsonValue, field: &str, value: JsonValue) {
    if !data.is_object() {
        *data = JsonValue::Object(Map::new());
    }

    let mut current = data;
    let mut segments = field.split('.').peekable();
    while let Some(segment) = segments.next() {
        // `current` is always an object here; replaced above or below
        let map = match current {
            JsonValue::Object(map) => map,
            _ => return,
        };

        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }

        let next = map
            .entry(segment.to_string())
            .or_insert_with(|| JsonValue::Object(Map::new()));
        if !next.is_object() {
            *next = JsonValue::Object(Map::new());
        }
        current = next;
    }
}

/// Apply field operations in order to a document body
pub fn apply_field_ops(data: &mut JsonValue, ops: &[FieldOp], now_millis: i64) {
    for op in ops {
        match op {
            FieldOp::Set { field, value } => set_field(data, field, value.clone()),
            FieldOp::Increment { field, by } => {
                let current = lookup_field(data, field)
                    .and_then(JsonValue::as_i64)
                    .unwrap_or(0);
                set_field(data, field, JsonValue::from(current + by));
            }
            FieldOp::ServerTimestamp { field } => {
                set_field(data, field, JsonValue::from(now_millis))
            }
        }
    }
}

fn values_equal(a: &JsonValue, b: &JsonValue) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) if a.is_number() && b.is_number() => x == y,
        _ => a == b,
    }
}

fn compare_values(a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (JsonValue::String(x), JsonValue::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
