//! Migration registration and lookup.
//!
//! Applications register every migration unit explicitly with a
//! [`MigrationRegistry`]. [`MigrationRegistry::build`] validates the whole set
//! once and produces immutable [`Migrations`] that can be shared across any
//! number of concurrent readers without locking.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::migration::{DatabaseMigration, DocumentMigration};
use crate::services::Services;
use crate::version::DocumentVersion;

/// Group shared by all database migrations.
pub const DATABASE_TARGET: &str = "database";

/// How the locator groups, orders and identifies a kind of migration unit.
pub trait Locatable {
    /// Whether unit ids are ledger keys and must be unique across the locator.
    const LEDGER_KEYED: bool;

    fn target(&self) -> &str;

    fn unit_version(&self) -> DocumentVersion;

    fn unit_id(&self) -> String;
}

impl Locatable for dyn DocumentMigration {
    const LEDGER_KEYED: bool = false;

    fn target(&self) -> &str {
        self.document_type()
    }

    fn unit_version(&self) -> DocumentVersion {
        self.version()
    }

    fn unit_id(&self) -> String {
        self.id()
    }
}

impl Locatable for dyn DatabaseMigration {
    const LEDGER_KEYED: bool = true;

    fn target(&self) -> &str {
        DATABASE_TARGET
    }

    fn unit_version(&self) -> DocumentVersion {
        self.version()
    }

    fn unit_id(&self) -> String {
        self.id()
    }
}

/// Migration units grouped by target and sorted ascending by version.
pub struct MigrationLocator<M: ?Sized> {
    groups: BTreeMap<String, Vec<Arc<M>>>,
}

pub type DocumentMigrationLocator = MigrationLocator<dyn DocumentMigration>;
pub type DatabaseMigrationLocator = MigrationLocator<dyn DatabaseMigration>;

impl<M: ?Sized + Locatable> MigrationLocator<M> {
    /// Group, sort and validate a set of units.
    pub fn from_units(units: Vec<Arc<M>>) -> Result<Self> {
        let mut groups: BTreeMap<String, Vec<Arc<M>>> = BTreeMap::new();
        let mut ids = HashSet::new();

        for unit in units {
            if unit.unit_version().is_default() {
                return Err(Error::Config(format!(
                    "migration {} for {} declares version {}, which can never be applied",
                    unit.unit_id(),
                    unit.target(),
                    DocumentVersion::DEFAULT
                )));
            }
            if M::LEDGER_KEYED && !ids.insert(unit.unit_id()) {
                return Err(Error::DuplicateMigrationDefinition(format!(
                    "migration id '{}' is registered more than once",
                    unit.unit_id()
                )));
            }
            groups
                .entry(unit.target().to_string())
                .or_default()
                .push(unit);
        }

        for (target, group) in groups.iter_mut() {
            group.sort_by_key(|unit| unit.unit_version());
            if let Some(pair) = group
                .windows(2)
                .find(|pair| pair[0].unit_version() == pair[1].unit_version())
            {
                return Err(Error::DuplicateMigrationDefinition(format!(
                    "{} has two migrations at version {}: {} and {}",
                    target,
                    pair[0].unit_version(),
                    pair[0].unit_id(),
                    pair[1].unit_id()
                )));
            }
        }

        Ok(Self { groups })
    }

    /// All units registered for `target`, ascending. Empty when none are.
    pub fn migrations(&self, target: &str) -> &[Arc<M>] {
        self.groups.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Highest registered version for `target`, or `DEFAULT` when none.
    pub fn latest_version(&self, target: &str) -> DocumentVersion {
        self.migrations(target)
            .last()
            .map(|unit| unit.unit_version())
            .unwrap_or(DocumentVersion::DEFAULT)
    }

    /// Whether `target` has a unit at exactly `version`.
    pub fn has_version(&self, target: &str, version: DocumentVersion) -> bool {
        self.migrations(target)
            .binary_search_by_key(&version, |unit| unit.unit_version())
            .is_ok()
    }

    /// Units with `from < version <= to`, ascending.
    pub fn migrations_between(
        &self,
        target: &str,
        from: DocumentVersion,
        to: DocumentVersion,
    ) -> Vec<Arc<M>> {
        self.migrations(target)
            .iter()
            .filter(|unit| {
                let v = unit.unit_version();
                v > from && v <= to
            })
            .cloned()
            .collect()
    }

    /// Units with `to < version <= from`, descending.
    pub fn migrations_between_descending(
        &self,
        target: &str,
        from: DocumentVersion,
        to: DocumentVersion,
    ) -> Vec<Arc<M>> {
        self.migrations(target)
            .iter()
            .rev()
            .filter(|unit| {
                let v = unit.unit_version();
                v <= from && v > to
            })
            .cloned()
            .collect()
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Total number of units across all targets.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl<M: ?Sized + Locatable> fmt::Debug for MigrationLocator<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (target, group) in &self.groups {
            let versions: Vec<String> = group.iter().map(|u| u.unit_version().to_string()).collect();
            map.entry(target, &versions);
        }
        map.finish()
    }
}

/// Every registered migration, validated and ready to share.
#[derive(Clone, Debug)]
pub struct Migrations {
    pub document: Arc<DocumentMigrationLocator>,
    pub database: Arc<DatabaseMigrationLocator>,
}

impl Migrations {
    /// No migrations at all.
    pub fn empty() -> Self {
        Self {
            document: Arc::new(MigrationLocator {
                groups: BTreeMap::new(),
            }),
            database: Arc::new(MigrationLocator {
                groups: BTreeMap::new(),
            }),
        }
    }
}

type DocumentFactory = Box<dyn FnOnce(&Services) -> Result<Arc<dyn DocumentMigration>>>;
type DatabaseFactory = Box<dyn FnOnce(&Services) -> Result<Arc<dyn DatabaseMigration>>>;

/// Builder collecting migration units and the collaborators they need.
///
/// ```
/// use docmorph_core::{DocumentVersion, MigrationRegistry, MigrationStep};
///
/// let migrations = MigrationRegistry::new()
///     .document(MigrationStep::new("Car", DocumentVersion::new(0, 0, 1), |doc| {
///         doc.rename("Dors", "Door");
///         Ok(())
///     }))
///     .build()
///     .unwrap();
///
/// assert_eq!(migrations.document.latest_version("Car"), DocumentVersion::new(0, 0, 1));
/// assert!(migrations.document.migrations("Boat").is_empty());
/// ```
#[derive(Default)]
pub struct MigrationRegistry {
    services: Services,
    document: Vec<DocumentFactory>,
    database: Vec<DatabaseFactory>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provide a collaborator that factories can resolve.
    pub fn provide<T: Send + Sync + 'static>(mut self, service: T) -> Self {
        self.services.insert(service);
        self
    }

    /// Register a ready-made document migration.
    pub fn document<M: DocumentMigration + 'static>(self, migration: M) -> Self {
        self.document_with(move |_| Ok(migration))
    }

    /// Register a document migration built from provided collaborators.
    pub fn document_with<M, F>(mut self, factory: F) -> Self
    where
        M: DocumentMigration + 'static,
        F: FnOnce(&Services) -> Result<M> + 'static,
    {
        self.document.push(Box::new(move |services: &Services| {
            factory(services).map(|m| Arc::new(m) as Arc<dyn DocumentMigration>)
        }));
        self
    }

    /// Register a ready-made database migration.
    pub fn database<M: DatabaseMigration + 'static>(self, migration: M) -> Self {
        self.database_with(move |_| Ok(migration))
    }

    /// Register a database migration built from provided collaborators.
    pub fn database_with<M, F>(mut self, factory: F) -> Self
    where
        M: DatabaseMigration + 'static,
        F: FnOnce(&Services) -> Result<M> + 'static,
    {
        self.database.push(Box::new(move |services: &Services| {
            factory(services).map(|m| Arc::new(m) as Arc<dyn DatabaseMigration>)
        }));
        self
    }

    /// Instantiate every unit once and validate the whole set.
    ///
    /// Fails on duplicate versions per target, duplicate database migration
    /// ids, units at `0.0.0`, and unresolvable collaborators.
    pub fn build(self) -> Result<Migrations> {
        let services = self.services;

        let document_units = self
            .document
            .into_iter()
            .map(|factory| factory(&services))
            .collect::<Result<Vec<_>>>()?;
        let database_units = self
            .database
            .into_iter()
            .map(|factory| factory(&services))
            .collect::<Result<Vec<_>>>()?;

        let document = DocumentMigrationLocator::from_units(document_units)?;
        let database = DatabaseMigrationLocator::from_units(database_units)?;

        for target in document.targets() {
            debug!(
                subsystem = "migrations",
                component = "locator",
                document_type = target,
                latest_version = %document.latest_version(target),
                count = document.migrations(target).len(),
                "Document migrations registered"
            );
        }
        info!(
            subsystem = "migrations",
            component = "locator",
            op = "build",
            document_migrations = document.len(),
            database_migrations = database.len(),
            "Migration locator initialized"
        );

        Ok(Migrations {
            document: Arc::new(document),
            database: Arc::new(database),
        })
    }
}
