//! MongoDB client and document store backend
//!
//! Documents are stored with their full path as `_id` and, for
//! sub-collections, the owning document path as `_parent`. Collection names
//! come from [`collection_key`], so every `users/*/suggestions` document
//! lives in the `users.suggestions` collection. Write batches run inside a
//! multi-document transaction, which needs a replica set deployment.

use bson::{doc, Bson, Document as BsonDocument};
use chrono::Utc;
use futures_util::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::{Client, ClientSession, Collection, IndexModel};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::db::path::{collection_key, collection_parent, DocPath};
use crate::db::schemas::collection_indexes;
use crate::db::store::{Document, DocumentStore, FieldOp, FilterOp, Query, Write, WriteBatch};
use crate::types::{HearthError, Result};

const ID_FIELD: &str = "_id";
const PARENT_FIELD: &str = "_parent";
const DUPLICATE_KEY_CODE: i32 = 11000;

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB at {}", uri);

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| HearthError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| HearthError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get the raw MongoDB client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Get the database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// [`DocumentStore`] backed by MongoDB
#[derive(Clone)]
pub struct MongoStore {
    client: MongoClient,
}

impl MongoStore {
    pub fn new(client: MongoClient) -> Self {
        Self { client }
    }

    fn collection(&self, collection: &str) -> Collection<BsonDocument> {
        self.client
            .inner()
            .database(self.client.db_name())
            .collection(&collection_key(collection))
    }

    /// Create the indexes the handlers and jobs query on
    pub async fn ensure_indexes(&self) -> Result<()> {
        for (collection, indexes) in collection_indexes() {
            if indexes.is_empty() {
                continue;
            }

            let models: Vec<IndexModel> = indexes
                .into_iter()
                .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
                .collect();

            self.client
                .inner()
                .database(self.client.db_name())
                .collection::<BsonDocument>(collection)
                .create_indexes(models)
                .await
                .map_err(|e| {
                    HearthError::Database(format!(
                        "Failed to create indexes on {}: {}",
                        collection, e
                    ))
                })?;
            debug!(collection = collection, "Indexes ensured");
        }
        Ok(())
    }

    fn to_stored(path: &DocPath, data: JsonValue) -> Result<BsonDocument> {
        let mut stored = match bson::to_bson(&data)? {
            Bson::Document(d) => d,
            other => {
                return Err(HearthError::InvalidDocument(format!(
                    "{}: document body must be an object, got {:?}",
                    path,
                    other.element_type()
                )))
            }
        };

        stored.insert(ID_FIELD, path.to_string());
        if let Some(parent) = path.parent() {
            stored.insert(PARENT_FIELD, parent.to_string());
        }
        Ok(stored)
    }

    fn from_stored(mut stored: BsonDocument) -> Result<Document> {
        let id = stored
            .get_str(ID_FIELD)
            .map_err(|e| HearthError::InvalidDocument(format!("stored document without path: {}", e)))?
            .to_string();
        let path = DocPath::parse(&id)?;

        stored.remove(ID_FIELD);
        stored.remove(PARENT_FIELD);
        Ok(Document::new(path, Bson::Document(stored).into_relaxed_extjson()))
    }

    fn filter_doc(collection: &str, query: &Query) -> Result<BsonDocument> {
        let mut filter = BsonDocument::new();
        if let Some(parent) = collection_parent(collection) {
            filter.insert(PARENT_FIELD, parent);
        }

        for f in &query.filters {
            let value = bson::to_bson(&f.value)?;
            match f.op {
                FilterOp::Eq => filter.insert(f.field.clone(), value),
                FilterOp::Lt => filter.insert(f.field.clone(), doc! { "$lt": value }),
            };
        }
        Ok(filter)
    }

    fn update_doc(ops: &[FieldOp], now_millis: i64) -> Result<BsonDocument> {
        let mut set = BsonDocument::new();
        let mut inc = BsonDocument::new();

        for op in ops {
            match op {
                FieldOp::Set { field, value } => {
                    set.insert(field.clone(), bson::to_bson(value)?);
                }
                FieldOp::Increment { field, by } => {
                    inc.insert(field.clone(), Bson::Int64(*by));
                }
                FieldOp::ServerTimestamp { field } => {
                    set.insert(field.clone(), Bson::Int64(now_millis));
                }
            }
        }

        let mut update = BsonDocument::new();
        if !set.is_empty() {
            update.insert("$set", set);
        }
        if !inc.is_empty() {
            update.insert("$inc", inc);
        }
        Ok(update)
    }

    async fn apply_write(&self, session: &mut ClientSession, write: Write) -> Result<()> {
        match write {
            Write::Create { path, data } => {
                let stored = Self::to_stored(&path, data)?;
                self.collection(path.collection())
                    .insert_one(stored)
                    .session(&mut *session)
                    .await
                    .map_err(|e| map_insert_error(&path, e))?;
            }
            Write::Set { path, data } => {
                let stored = Self::to_stored(&path, data)?;
                self.collection(path.collection())
                    .replace_one(doc! { ID_FIELD: path.to_string() }, stored)
                    .upsert(true)
                    .session(&mut *session)
                    .await?;
            }
            Write::Update { path, ops } => {
                let update = Self::update_doc(&ops, Utc::now().timestamp_millis())?;
                let result = self
                    .collection(path.collection())
                    .update_one(doc! { ID_FIELD: path.to_string() }, update)
                    .session(&mut *session)
                    .await?;
                if result.matched_count == 0 {
                    return Err(HearthError::NotFound(path.to_string()));
                }
            }
            Write::Delete { path } => {
                self.collection(path.collection())
                    .delete_one(doc! { ID_FIELD: path.to_string() })
                    .session(&mut *session)
                    .await?;
            }
        }
        Ok(())
    }
}

fn map_insert_error(path: &DocPath, err: mongodb::error::Error) -> HearthError {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref write_error))
            if write_error.code == DUPLICATE_KEY_CODE =>
        {
            HearthError::AlreadyExists(path.to_string())
        }
        _ => HearthError::Database(format!("Insert of {} failed: {}", path, err)),
    }
}

#[async_trait::async_trait]
impl DocumentStore for MongoStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>> {
        let stored = self
            .collection(path.collection())
            .find_one(doc! { ID_FIELD: path.to_string() })
            .await
            .map_err(|e| HearthError::Database(format!("Find of {} failed: {}", path, e)))?;

        stored.map(Self::from_stored).transpose()
    }

    async fn set(&self, path: &DocPath, data: JsonValue) -> Result<()> {
        let stored = Self::to_stored(path, data)?;
        self.collection(path.collection())
            .replace_one(doc! { ID_FIELD: path.to_string() }, stored)
            .upsert(true)
            .await
            .map_err(|e| HearthError::Database(format!("Set of {} failed: {}", path, e)))?;
        Ok(())
    }

    async fn update(&self, path: &DocPath, ops: Vec<FieldOp>) -> Result<()> {
        let update = Self::update_doc(&ops, Utc::now().timestamp_millis())?;
        if update.is_empty() {
            return match self.get(path).await? {
                Some(_) => Ok(()),
                None => Err(HearthError::NotFound(path.to_string())),
            };
        }

        let result = self
            .collection(path.collection())
            .update_one(doc! { ID_FIELD: path.to_string() }, update)
            .await
            .map_err(|e| HearthError::Database(format!("Update of {} failed: {}", path, e)))?;

        if result.matched_count == 0 {
            return Err(HearthError::NotFound(path.to_string()));
        }
        Ok(())
    }

    async fn add(&self, collection: &str, data: JsonValue) -> Result<DocPath> {
        let path = DocPath::new(collection, uuid::Uuid::new_v4().simple().to_string());
        let stored = Self::to_stored(&path, data)?;
        self.collection(collection)
            .insert_one(stored)
            .await
            .map_err(|e| map_insert_error(&path, e))?;
        Ok(path)
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        let filter = Self::filter_doc(collection, query)?;
        let target = self.collection(collection);
        let mut find = target.find(filter).sort(doc! { ID_FIELD: 1 });
        if let Some(limit) = query.limit {
            find = find.limit(limit as i64);
        }

        let stored: Vec<BsonDocument> = find
            .await
            .map_err(|e| HearthError::Database(format!("Query on {} failed: {}", collection, e)))?
            .try_collect()
            .await
            .map_err(|e| HearthError::Database(format!("Cursor on {} failed: {}", collection, e)))?;

        stored.into_iter().map(Self::from_stored).collect()
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let count = batch.len();
        let mut session = self.client.inner().start_session().await?;
        session.start_transaction().await?;

        for write in batch.into_writes() {
            if let Err(e) = self.apply_write(&mut session, write).await {
                if let Err(abort_err) = session.abort_transaction().await {
                    warn!("Failed to abort transaction: {}", abort_err);
                }
                return Err(e);
            }
        }

        session.commit_transaction().await?;
        debug!(writes = count, "Committed batch transaction");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // Round trips against a live server need a MongoDB replica set.
    // The pure conversion helpers are covered here.
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stored_document_carries_path_and_parent() {
        let path = DocPath::parse("prayerRequests/r1/prayers/u1").unwrap();
        let stored = MongoStore::to_stored(&path, json!({"note": "x"})).unwrap();
        assert_eq!(stored.get_str(ID_FIELD).unwrap(), "prayerRequests/r1/prayers/u1");
        assert_eq!(stored.get_str(PARENT_FIELD).unwrap(), "prayerRequests/r1");

        let doc = MongoStore::from_stored(stored).unwrap();
        assert_eq!(doc.path, path);
        assert_eq!(doc.data, json!({"note": "x"}));
    }

    #[test]
    fn test_non_object_body_rejected() {
        let path = DocPath::new("profiles", "a");
        assert!(MongoStore::to_stored(&path, json!([1, 2])).is_err());
    }

    #[test]
    fn test_filter_doc() {
        let query = Query::new()
            .where_eq("griefType", json!("Loss of Spouse"))
            .where_lt("createdAt", json!(1000));
        let filter = MongoStore::filter_doc("userActivity/u1/activities", &query).unwrap();
        assert_eq!(filter.get_str(PARENT_FIELD).unwrap(), "userActivity/u1");
        assert_eq!(filter.get_str("griefType").unwrap(), "Loss of Spouse");
        assert!(filter.get_document("createdAt").unwrap().contains_key("$lt"));
    }

    #[test]
    fn test_update_doc_groups_operators() {
        let update = MongoStore::update_doc(
            &[
                FieldOp::increment("prayCount", 1),
                FieldOp::server_timestamp("lastPrayedAt"),
            ],
            42,
        )
        .unwrap();
        assert_eq!(update.get_document("$inc").unwrap().get_i64("prayCount").unwrap(), 1);
        assert_eq!(update.get_document("$set").unwrap().get_i64("lastPrayedAt").unwrap(), 42);
    }
}
