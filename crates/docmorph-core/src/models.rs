//! Persisted records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::Document;
use crate::version::DocumentVersion;

/// Ledger entry proving a database migration has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationHistory {
    pub migration_id: String,
    pub version: DocumentVersion,
    pub applied_at: DateTime<Utc>,
}

impl MigrationHistory {
    /// Record an application happening now.
    pub fn applied_now(migration_id: impl Into<String>, version: DocumentVersion) -> Self {
        Self {
            migration_id: migration_id.into(),
            version,
            applied_at: Utc::now(),
        }
    }
}

/// A document together with its store-assigned id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: Uuid,
    pub document: Document,
}
