//! Migration units.
//!
//! A document migration moves one document between two adjacent versions of
//! its type. A database migration is a one-shot operation against the whole
//! store, tracked in the migration ledger by its id.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::traits::DocumentStore;
use crate::version::DocumentVersion;

/// Behaviour shared by every migration unit.
pub trait Migration: Send + Sync {
    /// The version this unit migrates to.
    fn version(&self) -> DocumentVersion;

    /// Identity of the unit.
    ///
    /// Defaults to the implementing type's path, which is stable across
    /// restarts of the same build. Database migrations are recognised in the
    /// ledger by this id, so override it to keep the id stable across renames.
    fn id(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// Transforms one document of `document_type` to [`Migration::version`] and back.
pub trait DocumentMigration: Migration {
    /// The document type this migration applies to.
    fn document_type(&self) -> &str;

    /// Move the document from the previous version up to this one.
    fn up(&self, document: &mut Document) -> Result<()>;

    /// Move the document from this version back to the previous one.
    ///
    /// Migrations that cannot be reversed keep the default, which fails the
    /// whole downgrade.
    fn down(&self, document: &mut Document) -> Result<()> {
        let _ = document;
        Err(Error::MissingDownMigration {
            document_type: self.document_type().to_string(),
            version: self.version(),
        })
    }
}

/// A one-shot, side-effecting operation against the whole store.
#[async_trait]
pub trait DatabaseMigration: Migration {
    async fn up(&self, store: &dyn DocumentStore) -> Result<()>;
}

type StepFn = Arc<dyn Fn(&mut Document) -> Result<()> + Send + Sync>;

/// A closure-backed [`DocumentMigration`].
///
/// ```
/// use docmorph_core::{Document, DocumentMigration, DocumentVersion, MigrationStep};
///
/// let step = MigrationStep::new("Car", DocumentVersion::new(0, 0, 1), |doc| {
///     doc.rename("Dors", "Door");
///     Ok(())
/// })
/// .with_down(|doc| {
///     doc.rename("Door", "Dors");
///     Ok(())
/// });
///
/// let mut doc = Document::new();
/// doc.insert("Dors", 3);
/// step.up(&mut doc).unwrap();
/// assert!(doc.contains_key("Door"));
/// ```
#[derive(Clone)]
pub struct MigrationStep {
    document_type: String,
    version: DocumentVersion,
    up: StepFn,
    down: Option<StepFn>,
}

impl MigrationStep {
    pub fn new<F>(document_type: impl Into<String>, version: DocumentVersion, up: F) -> Self
    where
        F: Fn(&mut Document) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            document_type: document_type.into(),
            version,
            up: Arc::new(up),
            down: None,
        }
    }

    /// Make the step reversible.
    pub fn with_down<F>(mut self, down: F) -> Self
    where
        F: Fn(&mut Document) -> Result<()> + Send + Sync + 'static,
    {
        self.down = Some(Arc::new(down));
        self
    }

    pub fn is_reversible(&self) -> bool {
        self.down.is_some()
    }
}

impl fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("document_type", &self.document_type)
            .field("version", &self.version)
            .field("reversible", &self.is_reversible())
            .finish()
    }
}

impl Migration for MigrationStep {
    fn version(&self) -> DocumentVersion {
        self.version
    }

    fn id(&self) -> String {
        format!("{}@{}", self.document_type, self.version)
    }
}

impl DocumentMigration for MigrationStep {
    fn document_type(&self) -> &str {
        &self.document_type
    }

    fn up(&self, document: &mut Document) -> Result<()> {
        (self.up)(document)
    }

    fn down(&self, document: &mut Document) -> Result<()> {
        match &self.down {
            Some(down) => down(document),
            None => Err(Error::MissingDownMigration {
                document_type: self.document_type.clone(),
                version: self.version,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct AddWheels;

    impl Migration for AddWheels {
        fn version(&self) -> DocumentVersion {
            DocumentVersion::new(0, 1, 0)
        }
    }

    impl DocumentMigration for AddWheels {
        fn document_type(&self) -> &str {
            "Car"
        }

        fn up(&self, document: &mut Document) -> Result<()> {
            document.insert("Wheels", 4);
            Ok(())
        }
    }

    #[test]
    fn test_migration_has_type_and_version() {
        let migration = AddWheels;
        assert_eq!(migration.document_type(), "Car");
        assert_eq!(migration.version().to_string(), "0.1.0");
    }

    #[test]
    fn test_default_id_is_type_path() {
        assert!(AddWheels.id().ends_with("AddWheels"));
    }

    #[test]
    fn test_default_down_is_missing() {
        let mut doc = Document::new();
        match AddWheels.down(&mut doc) {
            Err(Error::MissingDownMigration {
                document_type,
                version,
            }) => {
                assert_eq!(document_type, "Car");
                assert_eq!(version, DocumentVersion::new(0, 1, 0));
            }
            other => panic!("Expected MissingDownMigration, got {:?}", other),
        }
    }

    #[test]
    fn test_step_round_trip() {
        let step = MigrationStep::new("Car", DocumentVersion::new(0, 0, 1), |doc| {
            doc.rename("Dors", "Door");
            Ok(())
        })
        .with_down(|doc| {
            doc.rename("Door", "Dors");
            Ok(())
        });

        let mut doc = Document::try_from(json!({ "Dors": 3 })).unwrap();
        step.up(&mut doc).unwrap();
        assert_eq!(doc.get("Door"), Some(&json!(3)));
        step.down(&mut doc).unwrap();
        assert_eq!(doc.get("Dors"), Some(&json!(3)));
        assert_eq!(step.id(), "Car@0.0.1");
    }

    #[test]
    fn test_step_without_down_fails() {
        let step = MigrationStep::new("Car", DocumentVersion::new(0, 0, 1), |_| Ok(()));
        assert!(!step.is_reversible());
        assert!(matches!(
            step.down(&mut Document::new()),
            Err(Error::MissingDownMigration { .. })
        ));
    }
}
