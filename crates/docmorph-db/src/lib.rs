//! # docmorph-db
//!
//! PostgreSQL storage for docmorph.
//!
//! This crate provides:
//! - Connection pool management
//! - The migration ledger (`migration_history`)
//! - A schema-less document store (`docmorph_document`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use docmorph_db::Database;
//! use docmorph_core::MigrationHistoryRepository;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/docmorph").await?;
//!     db.migrate().await?;
//!
//!     for record in db.history.load().await? {
//!         println!("{} {}", record.version, record.migration_id);
//!     }
//!     Ok(())
//! }
//! ```
pub mod documents;
pub mod history;
pub mod pool;
pub mod test_fixtures;

use std::sync::Arc;

pub use documents::PgDocumentStore;
pub use history::PgMigrationHistoryRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};

#[cfg(feature = "migrations")]
use docmorph_core::Error;
use docmorph_core::Result;

/// Database handle bundling the pool and the repositories built on it.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Migration ledger.
    pub history: Arc<PgMigrationHistoryRepository>,
    /// Document collections.
    pub documents: Arc<PgDocumentStore>,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            history: Arc::new(PgMigrationHistoryRepository::new(pool.clone())),
            documents: Arc::new(PgDocumentStore::new(pool.clone())),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Apply the schema for the ledger and document tables.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
