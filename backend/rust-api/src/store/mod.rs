//! Record persistence.
//!
//! Services talk to a [`Repository`] per entity. Each repository sits on a
//! [`DocumentStore`], an object-safe trait over BSON documents keyed by
//! collection and `_id`. Every stored document carries a `_version` counter;
//! [`Repository::modify`] performs read, mutate, compare-and-swap and retries
//! on conflict, so concurrent requests for the same user never lose updates.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use mongodb::bson::{self, Document};
use serde::{de::DeserializeOwned, Serialize};
use std::{marker::PhantomData, sync::Arc};

use crate::metrics::track_db_operation;
use crate::utils::retry::{retry_with_backoff, RetryConfig};

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

pub const ID_FIELD: &str = "_id";
pub const VERSION_FIELD: &str = "_version";

/// Key of a record owned by a user, e.g. one activity row per user and day.
/// The owner part is escaped so it never contains the separator, which keeps
/// keys of different owners apart whatever characters their ids hold.
pub fn owned_key(owner: &str, item: &str) -> String {
    let owner = owner.replace('%', "%25").replace(':', "%3A");
    format!("{}:{}", owner, item)
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Inserts `document` unless one with the same `_id` already exists.
    /// Returns the stored document and whether this call created it.
    async fn insert_if_absent(
        &self,
        collection: &str,
        document: Document,
    ) -> Result<(Document, bool)>;

    /// Replaces the document only while its `_version` still equals
    /// `expected_version`. Returns `false` when another writer got there first.
    async fn replace_versioned(
        &self,
        collection: &str,
        id: &str,
        expected_version: i64,
        document: Document,
    ) -> Result<bool>;

    /// Equality match on top-level fields.
    async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>>;

    /// Removes the document. Returns `false` when there was nothing to remove.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool>;

    async fn ping(&self) -> Result<()>;
}

/// An entity persisted in its own collection under a stable string key.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;

    fn id(&self) -> String;
}

pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _record: PhantomData,
        }
    }
}

impl<T: Record> Repository<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<T>> {
        let found = track_db_operation(
            "find_by_id",
            T::COLLECTION,
            self.store.find_by_id(T::COLLECTION, id),
        )
        .await?;
        found.map(decode::<T>).transpose()
    }

    pub async fn get_or_create(&self, id: &str, init: impl FnOnce() -> T) -> Result<T> {
        if let Some(existing) = self.get(id).await? {
            return Ok(existing);
        }
        let (stored, _) = self.create(&init()).await?;
        Ok(stored)
    }

    /// Create-if-absent. A concurrent or earlier insert with the same key wins
    /// and is returned with `created == false`.
    pub async fn create(&self, record: &T) -> Result<(T, bool)> {
        let document = encode(record, 0)?;
        let (stored, created) = track_db_operation(
            "insert",
            T::COLLECTION,
            self.store.insert_if_absent(T::COLLECTION, document),
        )
        .await?;
        Ok((decode(stored)?, created))
    }

    /// Update-or-create with the full record.
    pub async fn put(&self, record: &T) -> Result<T> {
        let (stored, _) = self
            .modify(&record.id(), || record.clone(), |current| *current = record.clone())
            .await?;
        Ok(stored)
    }

    /// Atomically applies `mutate` to the record stored under `id`, creating it
    /// from `init` first when absent. `mutate` may run more than once when a
    /// concurrent writer wins the race, so it must only touch the record.
    pub async fn modify<I, F, R>(&self, id: &str, init: I, mutate: F) -> Result<(T, R)>
    where
        I: Fn() -> T + Sync,
        F: Fn(&mut T) -> R + Sync,
        R: Send,
    {
        let policy = RetryConfig::version_conflicts();
        track_db_operation(
            "modify",
            T::COLLECTION,
            retry_with_backoff(&policy, || self.try_modify(id, &init, &mutate)),
        )
        .await
    }

    async fn try_modify<I, F, R>(&self, id: &str, init: &I, mutate: &F) -> Result<(T, R)>
    where
        I: Fn() -> T + Sync,
        F: Fn(&mut T) -> R + Sync,
        R: Send,
    {
        let document = match self.store.find_by_id(T::COLLECTION, id).await? {
            Some(document) => document,
            None => {
                let (stored, _) = self
                    .store
                    .insert_if_absent(T::COLLECTION, encode(&init(), 0)?)
                    .await?;
                stored
            }
        };

        let version = version_of(&document);
        let mut record: T = decode(document)?;
        let outcome = mutate(&mut record);

        let replaced = self
            .store
            .replace_versioned(T::COLLECTION, id, version, encode(&record, version + 1)?)
            .await?;
        if !replaced {
            tracing::debug!("Version conflict on {}/{}, retrying", T::COLLECTION, id);
            return Err(anyhow!("version conflict on {}/{}", T::COLLECTION, id));
        }

        Ok((record, outcome))
    }

    pub async fn find(&self, filter: Document) -> Result<Vec<T>> {
        let documents = track_db_operation(
            "find",
            T::COLLECTION,
            self.store.find(T::COLLECTION, filter),
        )
        .await?;
        documents.into_iter().map(decode::<T>).collect()
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        track_db_operation("delete", T::COLLECTION, self.store.delete(T::COLLECTION, id)).await
    }
}

fn encode<T: Record>(record: &T, version: i64) -> Result<Document> {
    let mut document = bson::to_document(record)
        .with_context(|| format!("Failed to encode {} record", T::COLLECTION))?;
    document.insert(ID_FIELD, record.id());
    document.insert(VERSION_FIELD, version);
    Ok(document)
}

fn decode<T: Record>(document: Document) -> Result<T> {
    bson::from_document(document)
        .with_context(|| format!("Failed to decode {} record", T::COLLECTION))
}

pub(crate) fn version_of(document: &Document) -> i64 {
    document
        .get_i64(VERSION_FIELD)
        .or_else(|_| document.get_i32(VERSION_FIELD).map(i64::from))
        .unwrap_or(0)
}

pub(crate) fn document_id(document: &Document) -> Result<String> {
    document
        .get_str(ID_FIELD)
        .map(str::to_string)
        .map_err(|_| anyhow!("document is missing a string _id"))
}
