use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    error::{ErrorKind, WriteFailure},
    Collection, Database, IndexModel,
};

use super::{document_id, DocumentStore, ID_FIELD, VERSION_FIELD};

/// Collections that are queried by owner.
const USER_SCOPED_COLLECTIONS: &[&str] = &[
    "achievements",
    "activity_logs",
    "challenge_progress",
    "chat_sessions",
    "chat_messages",
    "flashcards",
    "lesson_progress",
    "study_sessions",
    "translations",
];

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection::<Document>(name)
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        for name in USER_SCOPED_COLLECTIONS {
            let index = IndexModel::builder().keys(doc! { "user_id": 1 }).build();
            self.collection(name)
                .create_index(index)
                .await
                .with_context(|| format!("Failed to create user_id index on {}", name))?;
        }
        tracing::info!(
            "Ensured user_id indexes on {} collections",
            USER_SCOPED_COLLECTIONS.len()
        );
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.collection(collection)
            .find_one(doc! { ID_FIELD: id })
            .await
            .with_context(|| format!("Failed to query {} by id", collection))
    }

    async fn insert_if_absent(
        &self,
        collection: &str,
        document: Document,
    ) -> Result<(Document, bool)> {
        let id = document_id(&document)?;
        match self.collection(collection).insert_one(&document).await {
            Ok(_) => Ok((document, true)),
            Err(e) if is_duplicate_key(&e) => {
                let existing = self
                    .find_by_id(collection, &id)
                    .await?
                    .ok_or_else(|| anyhow!("{} {} vanished after duplicate insert", collection, id))?;
                Ok((existing, false))
            }
            Err(e) => {
                Err(anyhow::Error::new(e).context(format!("Failed to insert into {}", collection)))
            }
        }
    }

    async fn replace_versioned(
        &self,
        collection: &str,
        id: &str,
        expected_version: i64,
        document: Document,
    ) -> Result<bool> {
        let result = self
            .collection(collection)
            .replace_one(doc! { ID_FIELD: id, VERSION_FIELD: expected_version }, document)
            .await
            .with_context(|| format!("Failed to replace {} {}", collection, id))?;
        Ok(result.matched_count == 1)
    }

    async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>> {
        let cursor = self
            .collection(collection)
            .find(filter)
            .await
            .with_context(|| format!("Failed to query {}", collection))?;
        cursor
            .try_collect()
            .await
            .with_context(|| format!("Failed to read {} cursor", collection))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let result = self
            .collection(collection)
            .delete_one(doc! { ID_FIELD: id })
            .await
            .with_context(|| format!("Failed to delete {} {}", collection, id))?;
        Ok(result.deleted_count == 1)
    }

    async fn ping(&self) -> Result<()> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .context("MongoDB ping failed")?;
        Ok(())
    }
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == 11000
    )
}
