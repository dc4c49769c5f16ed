//! In-memory storage adapters.
//!
//! Used by tests and by embedders that do not need durable storage. Both
//! adapters are safe to share across tasks.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::models::{MigrationHistory, StoredDocument};
use crate::traits::{DocumentStore, MigrationHistoryRepository};

/// Migration ledger kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryHistoryRepository {
    records: RwLock<Vec<MigrationHistory>>,
}

impl InMemoryHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing records, as if they had been appended in order.
    pub fn with_records(records: Vec<MigrationHistory>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }
}

#[async_trait]
impl MigrationHistoryRepository for InMemoryHistoryRepository {
    async fn load(&self) -> Result<Vec<MigrationHistory>> {
        let mut records = self.records.read().await.clone();
        records.sort_by(|a, b| {
            a.version
                .cmp(&b.version)
                .then_with(|| a.applied_at.cmp(&b.applied_at))
        });
        Ok(records)
    }

    async fn append(&self, record: MigrationHistory) -> Result<()> {
        let mut records = self.records.write().await;
        if records
            .iter()
            .any(|existing| existing.migration_id == record.migration_id)
        {
            return Err(Error::DuplicateKey(format!(
                "migration {} is already recorded",
                record.migration_id
            )));
        }
        records.push(record);
        Ok(())
    }
}

/// Collections of documents kept in process memory, in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<BTreeMap<String, Vec<StoredDocument>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in `collection`.
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self
            .collections
            .read()
            .await
            .iter()
            .filter(|(_, documents)| !documents.is_empty())
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn find_all(&self, collection: &str) -> Result<Vec<StoredDocument>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn find_page(
        &self,
        collection: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<StoredDocument>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|documents| documents.iter().skip(offset).take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|documents| documents.iter().find(|stored| stored.id == id))
            .map(|stored| stored.document.clone()))
    }

    async fn insert(&self, collection: &str, document: Document) -> Result<Uuid> {
        let id = Uuid::now_v7();
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .push(StoredDocument { id, document });
        Ok(id)
    }

    async fn replace(&self, collection: &str, id: Uuid, document: Document) -> Result<()> {
        let mut collections = self.collections.write().await;
        match collections
            .get_mut(collection)
            .and_then(|documents| documents.iter_mut().find(|stored| stored.id == id))
        {
            Some(existing) => {
                existing.document = document;
                Ok(())
            }
            None => Err(Error::NotFound(format!(
                "document {} in collection {}",
                id, collection
            ))),
        }
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<bool> {
        let mut collections = self.collections.write().await;
        let Some(documents) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = documents.len();
        documents.retain(|stored| stored.id != id);
        Ok(documents.len() < before)
    }

    async fn drop_collection(&self, collection: &str) -> Result<u64> {
        Ok(self
            .collections
            .write()
            .await
            .remove(collection)
            .map(|documents| documents.len() as u64)
            .unwrap_or(0))
    }
}
