//! MongoDB client and collection wrapper

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::{
    options::{IndexOptions, ReturnDocument, UpdateModifications},
    results::{DeleteResult, UpdateResult},
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use tracing::{error, info};

use crate::db::schemas::Metadata;
use crate::types::SwitchyardError;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, SwitchyardError> {
        info!("Connecting to MongoDB at {}", uri);

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| SwitchyardError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        // Verify connection with timeout
        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| SwitchyardError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, SwitchyardError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + Default + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    /// Get the raw MongoDB client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Get the database name
    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    /// Atomically increment and fetch a named sequence counter.
    ///
    /// Backs FIFO queue indexes: every coordinator process sees a strictly
    /// increasing sequence regardless of which one enqueues.
    pub async fn next_sequence(&self, name: &str) -> Result<u64, SwitchyardError> {
        let counters = self
            .client
            .database(&self.db_name)
            .collection::<Document>("counters");

        let updated = counters
            .find_one_and_update(
                doc! { "_id": name },
                doc! { "$inc": { "value": 1_i64 } },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| SwitchyardError::Database(format!("Counter update failed: {}", e)))?;

        let value = updated
            .as_ref()
            .and_then(|d| d.get_i64("value").ok())
            .ok_or_else(|| SwitchyardError::Database("Counter document missing value".into()))?;

        Ok(value as u64)
    }
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + Default + IntoIndexes + MutMetadata,
{
    /// Create a new collection and apply indexes
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, SwitchyardError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        // Apply indexes
        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    /// Apply schema-defined indexes
    async fn apply_indexes(&self) -> Result<(), SwitchyardError> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| SwitchyardError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert a document, setting metadata timestamps
    pub async fn insert_one(&self, mut item: T) -> Result<ObjectId, SwitchyardError> {
        let metadata = item.mut_metadata();
        metadata.created_at = Some(DateTime::now());
        metadata.updated_at = Some(DateTime::now());

        let result = self
            .inner
            .insert_one(item)
            .await
            .map_err(|e| SwitchyardError::Database(format!("Insert failed: {}", e)))?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| SwitchyardError::Database("Failed to get inserted ID".into()))
    }

    /// Insert, distinguishing a unique-index collision from other failures.
    ///
    /// Returns `Ok(None)` when the insert lost to an existing document with
    /// the same unique key. This is the primitive the base-path reservation
    /// compare-and-set is built on.
    pub async fn insert_one_unique(&self, mut item: T) -> Result<Option<ObjectId>, SwitchyardError> {
        use mongodb::error::{ErrorKind, WriteError, WriteFailure};

        let metadata = item.mut_metadata();
        metadata.created_at = Some(DateTime::now());
        metadata.updated_at = Some(DateTime::now());

        match self.inner.insert_one(item).await {
            Ok(result) => Ok(Some(result.inserted_id.as_object_id().ok_or_else(|| {
                SwitchyardError::Database("Failed to get inserted ID".into())
            })?)),
            Err(e) => match *e.kind {
                ErrorKind::Write(WriteFailure::WriteError(WriteError {
                    code: 11000, ..
                })) => Ok(None),
                _ => Err(SwitchyardError::Database(format!("Insert failed: {}", e))),
            },
        }
    }

    /// Find one document by filter
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, SwitchyardError> {
        self.inner
            .find_one(filter)
            .await
            .map_err(|e| SwitchyardError::Database(format!("Find failed: {}", e)))
    }

    /// Find many documents by filter, optionally sorted
    pub async fn find_many(
        &self,
        filter: Document,
        sort: Option<Document>,
    ) -> Result<Vec<T>, SwitchyardError> {
        use futures_util::StreamExt;

        let mut find = self.inner.find(filter);
        if let Some(sort) = sort {
            find = find.sort(sort);
        }

        let cursor = find
            .await
            .map_err(|e| SwitchyardError::Database(format!("Find failed: {}", e)))?;

        let results: Vec<T> = cursor
            .filter_map(|doc| async {
                match doc {
                    Ok(d) => Some(d),
                    Err(e) => {
                        error!("Error reading document: {}", e);
                        None
                    }
                }
            })
            .collect()
            .await;

        Ok(results)
    }

    /// Update one document
    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult, SwitchyardError> {
        self.inner
            .update_one(filter, update.into())
            .await
            .map_err(|e| SwitchyardError::Database(format!("Update failed: {}", e)))
    }

    /// Upsert one document
    pub async fn upsert_one(
        &self,
        filter: Document,
        update: Document,
    ) -> Result<UpdateResult, SwitchyardError> {
        self.inner
            .update_one(filter, update)
            .upsert(true)
            .await
            .map_err(|e| SwitchyardError::Database(format!("Upsert failed: {}", e)))
    }

    /// Remove one document
    pub async fn delete_one(&self, filter: Document) -> Result<DeleteResult, SwitchyardError> {
        self.inner
            .delete_one(filter)
            .await
            .map_err(|e| SwitchyardError::Database(format!("Delete failed: {}", e)))
    }

    /// Get the underlying collection for advanced operations
    pub fn inner(&self) -> &Collection<T> {
        &self.inner
    }
}
