//! Serialization boundary.
//!
//! Typed documents pass through a [`DocumentInterceptor`] on their way in and
//! out of storage. On read, the stored document is migrated to the version the
//! running code expects before it is materialized, when runtime migration is
//! enabled. On write, the outgoing document is always stamped with the version
//! it was written in.
//!
//! A type must be registered with
//! [`MigrationSettings::with_versioned_type`] before it crosses the boundary.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::runner::DocumentMigrationRunner;
use crate::settings::MigrationSettings;
use crate::version::DocumentVersion;

/// A Rust type persisted as a versioned document.
///
/// ```
/// use docmorph_core::{DocumentVersion, VersionedDocument};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Car {
///     #[serde(rename = "Doors")]
///     doors: u32,
/// }
///
/// impl VersionedDocument for Car {
///     const DOCUMENT_TYPE: &'static str = "Car";
///     const COLLECTION: Option<&'static str> = Some("cars");
/// }
///
/// assert!(Car::RUNTIME_VERSION.is_none());
/// ```
pub trait VersionedDocument: Serialize + DeserializeOwned {
    /// Name migrations for this type are registered under.
    const DOCUMENT_TYPE: &'static str;

    /// Collection swept at startup, if any.
    const COLLECTION: Option<&'static str> = None;

    /// Version the type's shape was written against, when it is not the
    /// latest registered one.
    const RUNTIME_VERSION: Option<DocumentVersion> = None;
}

/// Migrates documents on read and stamps them on write.
#[derive(Debug, Clone)]
pub struct DocumentInterceptor {
    runner: DocumentMigrationRunner,
    settings: Arc<MigrationSettings>,
}

impl DocumentInterceptor {
    pub fn new(runner: DocumentMigrationRunner, settings: Arc<MigrationSettings>) -> Self {
        Self { runner, settings }
    }

    pub fn runner(&self) -> &DocumentMigrationRunner {
        &self.runner
    }

    pub fn settings(&self) -> &MigrationSettings {
        &self.settings
    }

    /// Whether reads migrate.
    pub fn is_enabled(&self) -> bool {
        self.settings.runtime_migration_enabled
    }

    /// Version the running code works with for `document_type`.
    ///
    /// The configured pin wins, then the type's declared runtime version, then
    /// the latest registered migration.
    pub fn resolved_version(
        &self,
        document_type: &str,
        declared: Option<DocumentVersion>,
    ) -> DocumentVersion {
        self.settings
            .write_version(document_type)
            .or(declared)
            .unwrap_or_else(|| self.runner.latest_version(document_type))
    }

    /// Fails with [`Error::Config`] unless `T` was registered and its declared
    /// runtime version matches the registration.
    pub fn ensure_registered<T: VersionedDocument>(&self) -> Result<()> {
        match self.settings.document_type(T::DOCUMENT_TYPE) {
            Some(registered) if registered.typed => {
                if registered.runtime_version == T::RUNTIME_VERSION {
                    Ok(())
                } else {
                    Err(Error::Config(format!(
                        "{} declares a runtime version the registration for {} does not",
                        std::any::type_name::<T>(),
                        T::DOCUMENT_TYPE
                    )))
                }
            }
            _ => Err(Error::Config(format!(
                "{} is not registered as a versioned type",
                T::DOCUMENT_TYPE
            ))),
        }
    }

    /// Version stamped on documents of `T` when they are written.
    pub fn write_version<T: VersionedDocument>(&self) -> Result<DocumentVersion> {
        self.ensure_registered::<T>()?;
        Ok(self.resolved_version(T::DOCUMENT_TYPE, T::RUNTIME_VERSION))
    }

    /// Migrate a stored document and materialize it as `T`.
    ///
    /// Fields `T` does not know about, the version field included, are ignored.
    pub fn read<T: VersionedDocument>(&self, mut document: Document) -> Result<T> {
        let target = self.write_version::<T>()?;
        if self.is_enabled() {
            self.runner.run_to(T::DOCUMENT_TYPE, &mut document, target)?;
        }
        Ok(serde_json::from_value(document.into_value())?)
    }

    /// Migrate an untyped document of `document_type` to its resolved version.
    pub fn read_document(&self, document_type: &str, mut document: Document) -> Result<Document> {
        if self.is_enabled() {
            let target = self.resolved_version(document_type, None);
            self.runner.run_to(document_type, &mut document, target)?;
        }
        Ok(document)
    }

    /// Dematerialize `item` and stamp its write version.
    pub fn write<T: VersionedDocument>(&self, item: &T) -> Result<Document> {
        let version = self.write_version::<T>()?;
        let mut document = Document::try_from(serde_json::to_value(item)?)?;
        document.set_version(self.runner.version_field(), version);
        trace!(
            subsystem = "migrations",
            component = "interceptor",
            document_type = T::DOCUMENT_TYPE,
            version = %version,
            "Stamped outgoing document"
        );
        Ok(document)
    }

    /// Decode JSON bytes into `T`, migrating on the way.
    pub fn decode<T: VersionedDocument>(&self, bytes: &[u8]) -> Result<T> {
        self.read(Document::from_slice(bytes)?)
    }

    /// Encode `item` as stamped JSON bytes.
    pub fn encode<T: VersionedDocument>(&self, item: &T) -> Result<Vec<u8>> {
        self.write(item)?.to_vec()
    }
}
