//! # docmorph-core
//!
//! Document versions, migration units, and the machinery that moves documents
//! between versions.
//!
//! This crate holds everything that does not need a database connection: the
//! version value type, the registry and locator, the document runner, the
//! serialization interceptor, configuration, and in-memory storage adapters.

pub mod collection;
pub mod defaults;
pub mod document;
pub mod error;
pub mod interceptor;
pub mod locator;
pub mod logging;
pub mod memory;
pub mod migration;
pub mod models;
pub mod runner;
pub mod services;
pub mod settings;
pub mod traits;
pub mod version;

// Re-export commonly used types at crate root
pub use collection::VersionedCollection;
pub use document::Document;
pub use error::{Error, Result};
pub use interceptor::{DocumentInterceptor, VersionedDocument};
pub use locator::{
    DatabaseMigrationLocator, DocumentMigrationLocator, MigrationLocator, MigrationRegistry,
    Migrations, DATABASE_TARGET,
};
pub use memory::{InMemoryDocumentStore, InMemoryHistoryRepository};
pub use migration::{DatabaseMigration, DocumentMigration, Migration, MigrationStep};
pub use models::*;
pub use runner::{DocumentMigrationRunner, MigrationOutcome};
pub use services::Services;
pub use settings::{DocumentTypeSettings, MigrationSettings};
pub use traits::*;
pub use version::DocumentVersion;
