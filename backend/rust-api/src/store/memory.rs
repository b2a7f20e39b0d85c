use anyhow::Result;
use async_trait::async_trait;
use mongodb::bson::Document;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{document_id, version_of, DocumentStore};

type Collections = HashMap<String, BTreeMap<String, Document>>;

/// In-process store used by tests and by `database.backend = "memory"`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|documents| documents.get(id))
            .cloned())
    }

    async fn insert_if_absent(
        &self,
        collection: &str,
        document: Document,
    ) -> Result<(Document, bool)> {
        let id = document_id(&document)?;
        let mut collections = self.collections.write().await;
        let documents = collections.entry(collection.to_string()).or_default();

        if let Some(existing) = documents.get(&id) {
            return Ok((existing.clone(), false));
        }
        documents.insert(id, document.clone());
        Ok((document, true))
    }

    async fn replace_versioned(
        &self,
        collection: &str,
        id: &str,
        expected_version: i64,
        document: Document,
    ) -> Result<bool> {
        let mut collections = self.collections.write().await;
        let Some(current) = collections
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
        else {
            return Ok(false);
        };

        if version_of(current) != expected_version {
            return Ok(false);
        }
        *current = document;
        Ok(true)
    }

    async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|documents| {
                documents
                    .values()
                    .filter(|document| matches_filter(document, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(collection)
            .and_then(|documents| documents.remove(id))
            .is_some())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

fn matches_filter(document: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(field, expected)| document.get(field) == Some(expected))
}
