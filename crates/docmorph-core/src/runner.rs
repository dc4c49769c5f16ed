//! Document migration runner.
//!
//! Brings a single document from whatever version it carries to a target
//! version by applying the chain of registered migrations in order. The runner
//! never touches storage and holds no mutable state, so one instance can serve
//! any number of concurrent callers.

use std::sync::Arc;

use tracing::{debug, error, instrument, trace};

use crate::document::Document;
use crate::error::Result;
use crate::locator::DocumentMigrationLocator;
use crate::version::DocumentVersion;

/// What a run did to a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Already at the target version; nothing changed.
    Unchanged,
    /// Already at the target version but carried no version field, which was added.
    Stamped { version: DocumentVersion },
    Upgraded {
        from: DocumentVersion,
        to: DocumentVersion,
        steps: usize,
    },
    Downgraded {
        from: DocumentVersion,
        to: DocumentVersion,
        steps: usize,
    },
}

impl MigrationOutcome {
    /// Whether the document differs from what was passed in.
    pub fn is_changed(&self) -> bool {
        !matches!(self, MigrationOutcome::Unchanged)
    }
}

/// Applies document migration chains.
#[derive(Debug, Clone)]
pub struct DocumentMigrationRunner {
    locator: Arc<DocumentMigrationLocator>,
    version_field: String,
}

impl DocumentMigrationRunner {
    pub fn new(locator: Arc<DocumentMigrationLocator>, version_field: impl Into<String>) -> Self {
        Self {
            locator,
            version_field: version_field.into(),
        }
    }

    pub fn locator(&self) -> &DocumentMigrationLocator {
        &self.locator
    }

    pub fn version_field(&self) -> &str {
        &self.version_field
    }

    /// Latest registered version for `document_type`.
    pub fn latest_version(&self, document_type: &str) -> DocumentVersion {
        self.locator.latest_version(document_type)
    }

    /// Bring `document` to the latest registered version of its type.
    pub fn run(&self, document_type: &str, document: &mut Document) -> Result<MigrationOutcome> {
        let target = self.locator.latest_version(document_type);
        self.run_to(document_type, document, target)
    }

    /// Bring `document` to `target`, upgrading or downgrading as needed.
    ///
    /// The chain runs on a copy. On failure the caller's document is left
    /// exactly as it was and the migration's error is returned unchanged.
    #[instrument(
        skip(self, document),
        fields(subsystem = "migrations", component = "document_runner", op = "run_to", to_version = %target)
    )]
    pub fn run_to(
        &self,
        document_type: &str,
        document: &mut Document,
        target: DocumentVersion,
    ) -> Result<MigrationOutcome> {
        let stamped = document.version(&self.version_field)?;
        let current = stamped.unwrap_or(DocumentVersion::DEFAULT);

        if current == target {
            if stamped.is_some() {
                return Ok(MigrationOutcome::Unchanged);
            }
            document.set_version(&self.version_field, target);
            trace!(document_type, version = %target, "Stamped unversioned document");
            return Ok(MigrationOutcome::Stamped { version: target });
        }

        let mut scratch = document.clone();
        let outcome = if current < target {
            let chain = self
                .locator
                .migrations_between(document_type, current, target);
            debug!(
                document_type,
                from_version = %current,
                to_version = %target,
                steps = chain.len(),
                "Upgrading document"
            );
            for migration in &chain {
                if let Err(e) = migration.up(&mut scratch) {
                    error!(
                        document_type,
                        migration_id = %migration.id(),
                        version = %migration.version(),
                        error = %e,
                        "Document upgrade failed"
                    );
                    return Err(e);
                }
            }
            MigrationOutcome::Upgraded {
                from: current,
                to: target,
                steps: chain.len(),
            }
        } else {
            let chain = self
                .locator
                .migrations_between_descending(document_type, current, target);
            debug!(
                document_type,
                from_version = %current,
                to_version = %target,
                steps = chain.len(),
                "Downgrading document"
            );
            for migration in &chain {
                if let Err(e) = migration.down(&mut scratch) {
                    error!(
                        document_type,
                        migration_id = %migration.id(),
                        version = %migration.version(),
                        error = %e,
                        "Document downgrade failed"
                    );
                    return Err(e);
                }
            }
            MigrationOutcome::Downgraded {
                from: current,
                to: target,
                steps: chain.len(),
            }
        };

        scratch.set_version(&self.version_field, target);
        *document = scratch;
        Ok(outcome)
    }
}
