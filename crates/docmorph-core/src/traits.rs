//! Storage collaborator traits.
//!
//! The migration engine never talks to a database directly. Concrete stores
//! (in-memory, PostgreSQL) implement these traits.

use async_trait::async_trait;
use uuid::Uuid;

use crate::document::Document;
use crate::error::Result;
use crate::models::{MigrationHistory, StoredDocument};

// =============================================================================
// MIGRATION HISTORY
// =============================================================================

/// Ledger of applied database migrations.
#[async_trait]
pub trait MigrationHistoryRepository: Send + Sync {
    /// Load every record, ordered by version then application time.
    async fn load(&self) -> Result<Vec<MigrationHistory>>;

    /// Append a record.
    ///
    /// Must fail with [`crate::Error::DuplicateKey`] when a record with the
    /// same `migration_id` already exists. Runners racing on the same ledger
    /// rely on this for correctness.
    async fn append(&self, record: MigrationHistory) -> Result<()>;
}

// =============================================================================
// DOCUMENT STORE
// =============================================================================

/// Collections of schema-less documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Names of all collections holding at least one document.
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// All documents of a collection in insertion order.
    async fn find_all(&self, collection: &str) -> Result<Vec<StoredDocument>>;

    /// Up to `limit` documents of a collection in insertion order, skipping
    /// the first `offset`. Replacing a document keeps its position.
    async fn find_page(
        &self,
        collection: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<StoredDocument>>;

    /// Fetch one document.
    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>>;

    /// Insert a document and return its new id.
    async fn insert(&self, collection: &str, document: Document) -> Result<Uuid>;

    /// Replace an existing document. Fails with `NotFound` when absent.
    async fn replace(&self, collection: &str, id: Uuid, document: Document) -> Result<()>;

    /// Delete one document. Returns whether it existed.
    async fn delete(&self, collection: &str, id: Uuid) -> Result<bool>;

    /// Delete every document of a collection. Returns the number removed.
    async fn drop_collection(&self, collection: &str) -> Result<u64>;
}
