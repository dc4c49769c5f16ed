//! Migration configuration.
//!
//! Settings select which of the three execution modes run (runtime document
//! migration at the serialization boundary, the startup document sweep, and
//! database migrations), name the version field, and pin per-type write
//! versions for staged rollouts.

use std::collections::BTreeMap;

use tracing::debug;

use crate::defaults;
use crate::error::{Error, Result};
use crate::interceptor::VersionedDocument;
use crate::locator::DocumentMigrationLocator;
use crate::version::DocumentVersion;

/// Per-document-type configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentTypeSettings {
    /// Collection swept by the startup document migration.
    pub collection: Option<String>,
    /// Version stamped on write, when lower than the latest known version.
    pub write_version: Option<DocumentVersion>,
    /// Set once a Rust type was registered with
    /// [`MigrationSettings::with_versioned_type`].
    pub typed: bool,
    /// Runtime version declared by the registered Rust type.
    pub runtime_version: Option<DocumentVersion>,
}

/// Configuration consumed by the runners and the interceptor.
#[derive(Debug, Clone)]
pub struct MigrationSettings {
    /// Name of the field holding a document's version.
    pub version_field_name: String,
    /// Migrate documents transparently on read and stamp them on write.
    pub runtime_migration_enabled: bool,
    /// Sweep configured collections at startup.
    pub startup_document_migration_enabled: bool,
    /// Apply pending database migrations at startup.
    pub database_migration_enabled: bool,
    /// Database migrations at or below this version are never run.
    pub database_baseline: DocumentVersion,
    document_types: BTreeMap<String, DocumentTypeSettings>,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            version_field_name: defaults::VERSION_FIELD_NAME.to_string(),
            runtime_migration_enabled: false,
            startup_document_migration_enabled: false,
            database_migration_enabled: false,
            database_baseline: defaults::DATABASE_BASELINE,
            document_types: BTreeMap::new(),
        }
    }
}

impl MigrationSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create settings from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DOCMORPH_VERSION_FIELD` | `Version` | Version field name |
    /// | `DOCMORPH_RUNTIME_MIGRATION` | unset | Enable runtime document migration |
    /// | `DOCMORPH_STARTUP_MIGRATION` | unset | Enable the startup document sweep |
    /// | `DOCMORPH_DATABASE_MIGRATION` | unset | Enable database migrations |
    /// | `DOCMORPH_DATABASE_BASELINE` | `0.0.0` | Baseline for database migrations |
    ///
    /// When no mode is enabled, [`MigrationSettings::resolve`] enables all three.
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();

        if let Ok(field) = std::env::var("DOCMORPH_VERSION_FIELD") {
            settings = settings.with_version_field_name(field)?;
        }
        if let Some(enabled) = env_flag("DOCMORPH_RUNTIME_MIGRATION") {
            settings.runtime_migration_enabled = enabled;
        }
        if let Some(enabled) = env_flag("DOCMORPH_STARTUP_MIGRATION") {
            settings.startup_document_migration_enabled = enabled;
        }
        if let Some(enabled) = env_flag("DOCMORPH_DATABASE_MIGRATION") {
            settings.database_migration_enabled = enabled;
        }
        if let Ok(baseline) = std::env::var("DOCMORPH_DATABASE_BASELINE") {
            settings.database_baseline = DocumentVersion::parse(baseline.trim())?;
        }

        Ok(settings)
    }

    /// Use a different version field name.
    pub fn with_version_field_name(mut self, field: impl Into<String>) -> Result<Self> {
        let field = field.into();
        if field.trim().is_empty() {
            return Err(Error::Config("version field name cannot be empty".to_string()));
        }
        self.version_field_name = field;
        Ok(self)
    }

    /// Enable runtime document migration.
    pub fn with_runtime_document_migration(mut self) -> Self {
        self.runtime_migration_enabled = true;
        self
    }

    /// Enable the startup document sweep.
    pub fn with_startup_document_migration(mut self) -> Self {
        self.startup_document_migration_enabled = true;
        self
    }

    /// Enable database migrations.
    pub fn with_database_migration(mut self) -> Self {
        self.database_migration_enabled = true;
        self
    }

    pub fn with_database_baseline(mut self, baseline: DocumentVersion) -> Self {
        self.database_baseline = baseline;
        self
    }

    /// Register a document type with no collection and no pin.
    pub fn with_document_type(mut self, document_type: impl Into<String>) -> Self {
        self.document_types.entry(document_type.into()).or_default();
        self
    }

    /// Register a document type stored in `collection`.
    pub fn with_collection(
        mut self,
        document_type: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        self.document_types
            .entry(document_type.into())
            .or_default()
            .collection = Some(collection.into());
        self
    }

    /// Pin the version stamped on write for `document_type`.
    pub fn pin_write_version(
        mut self,
        document_type: impl Into<String>,
        version: DocumentVersion,
    ) -> Self {
        self.document_types
            .entry(document_type.into())
            .or_default()
            .write_version = Some(version);
        self
    }

    /// Register a typed document, taking its collection and declared runtime
    /// version from the type.
    ///
    /// An explicit `write_version` that disagrees with the type's declared
    /// [`VersionedDocument::RUNTIME_VERSION`], with a pin configured earlier, or
    /// with a type registered earlier under the same name is a configuration
    /// error. Typed reads and writes through a
    /// [`DocumentInterceptor`](crate::DocumentInterceptor) require this
    /// registration.
    pub fn with_versioned_type<T: VersionedDocument>(
        mut self,
        write_version: Option<DocumentVersion>,
    ) -> Result<Self> {
        let pin = match (write_version, T::RUNTIME_VERSION) {
            (Some(configured), Some(declared)) if configured != declared => {
                return Err(Error::Config(format!(
                    "{} declares runtime version {} but {} was configured",
                    T::DOCUMENT_TYPE,
                    declared,
                    configured
                )));
            }
            (configured, declared) => configured.or(declared),
        };

        if let Some(existing) = self.document_types.get(T::DOCUMENT_TYPE) {
            if existing.typed && existing.runtime_version != T::RUNTIME_VERSION {
                return Err(Error::Config(format!(
                    "{} is already registered with runtime version {}, {} declares {}",
                    T::DOCUMENT_TYPE,
                    describe(existing.runtime_version),
                    std::any::type_name::<T>(),
                    describe(T::RUNTIME_VERSION)
                )));
            }
            if let (Some(pinned), Some(pin)) = (existing.write_version, pin) {
                if pinned != pin {
                    return Err(Error::Config(format!(
                        "{} is pinned to write version {} but {} was registered",
                        T::DOCUMENT_TYPE,
                        pinned,
                        pin
                    )));
                }
            }
        }

        let entry = self
            .document_types
            .entry(T::DOCUMENT_TYPE.to_string())
            .or_default();
        if let Some(collection) = T::COLLECTION {
            entry.collection = Some(collection.to_string());
        }
        if pin.is_some() {
            entry.write_version = pin;
        }
        entry.typed = true;
        entry.runtime_version = T::RUNTIME_VERSION;
        Ok(self)
    }

    /// Whether any execution mode was selected.
    pub fn any_mode_enabled(&self) -> bool {
        self.runtime_migration_enabled
            || self.startup_document_migration_enabled
            || self.database_migration_enabled
    }

    /// Finalise the settings: when no mode was selected, enable all three.
    pub fn resolve(mut self) -> Self {
        if !self.any_mode_enabled() {
            debug!(
                subsystem = "migrations",
                component = "settings",
                "No migration mode selected, enabling all modes"
            );
            self.runtime_migration_enabled = true;
            self.startup_document_migration_enabled = true;
            self.database_migration_enabled = true;
        }
        self
    }

    pub fn document_type(&self, document_type: &str) -> Option<&DocumentTypeSettings> {
        self.document_types.get(document_type)
    }

    pub fn document_types(&self) -> impl Iterator<Item = (&str, &DocumentTypeSettings)> {
        self.document_types.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Pinned write version for a type, if one is configured.
    pub fn write_version(&self, document_type: &str) -> Option<DocumentVersion> {
        self.document_types
            .get(document_type)
            .and_then(|s| s.write_version)
    }

    /// Check pins and collections against the registered migrations.
    ///
    /// A pin must be `0.0.0` or the version of a registered migration of its
    /// type, and may not exceed the type's latest version. A type that declares
    /// a runtime version may only be pinned to that version.
    pub fn validate(&self, migrations: &DocumentMigrationLocator) -> Result<()> {
        for (document_type, type_settings) in &self.document_types {
            if let Some(collection) = &type_settings.collection {
                if collection.trim().is_empty() {
                    return Err(Error::Config(format!(
                        "collection for {} cannot be empty",
                        document_type
                    )));
                }
            }

            if let Some(declared) = type_settings.runtime_version {
                if type_settings.write_version != Some(declared) {
                    return Err(Error::Config(format!(
                        "{} declares runtime version {} but is pinned to {}",
                        document_type,
                        declared,
                        describe(type_settings.write_version)
                    )));
                }
            }

            let Some(pin) = type_settings.write_version else {
                continue;
            };
            let latest = migrations.latest_version(document_type);
            if pin > latest {
                return Err(Error::Config(format!(
                    "pinned write version {} for {} is newer than its latest migration {}",
                    pin, document_type, latest
                )));
            }
            if !pin.is_default() && !migrations.has_version(document_type, pin) {
                return Err(Error::Config(format!(
                    "pinned write version {} for {} does not match any registered migration",
                    pin, document_type
                )));
            }
        }
        Ok(())
    }
}

fn describe(version: Option<DocumentVersion>) -> String {
    version.map_or_else(|| "none".to_string(), |v| v.to_string())
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| v != "false" && v != "0")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::{MigrationRegistry, Migrations};
    use crate::migration::MigrationStep;
    use serde::{Deserialize, Serialize};

    fn v(s: &str) -> DocumentVersion {
        s.parse().unwrap()
    }

    fn car_migrations() -> Migrations {
        MigrationRegistry::new()
            .document(MigrationStep::new("Car", v("0.0.1"), |_| Ok(())))
            .document(MigrationStep::new("Car", v("0.0.2"), |_| Ok(())))
            .build()
            .unwrap()
    }

    #[derive(Serialize, Deserialize)]
    struct PinnedCar {
        doors: u32,
    }

    impl VersionedDocument for PinnedCar {
        const DOCUMENT_TYPE: &'static str = "Car";
        const COLLECTION: Option<&'static str> = Some("cars");
        const RUNTIME_VERSION: Option<DocumentVersion> = Some(DocumentVersion::new(0, 0, 1));
    }

    #[derive(Serialize, Deserialize)]
    struct LatestCar {
        doors: u32,
    }

    impl VersionedDocument for LatestCar {
        const DOCUMENT_TYPE: &'static str = "Car";
    }

    #[derive(Serialize, Deserialize)]
    struct FutureCar {
        doors: u32,
    }

    impl VersionedDocument for FutureCar {
        const DOCUMENT_TYPE: &'static str = "Car";
        const RUNTIME_VERSION: Option<DocumentVersion> = Some(DocumentVersion::new(0, 0, 9));
    }

    #[test]
    fn test_defaults() {
        let settings = MigrationSettings::default();
        assert_eq!(settings.version_field_name, "Version");
        assert!(!settings.any_mode_enabled());
        assert_eq!(settings.database_baseline, DocumentVersion::EMPTY);
    }

    #[test]
    fn test_resolve_enables_all_when_nothing_selected() {
        let settings = MigrationSettings::new().resolve();
        assert!(settings.runtime_migration_enabled);
        assert!(settings.startup_document_migration_enabled);
        assert!(settings.database_migration_enabled);
    }

    #[test]
    fn test_resolve_keeps_explicit_selection() {
        let settings = MigrationSettings::new()
            .with_runtime_document_migration()
            .resolve();
        assert!(settings.runtime_migration_enabled);
        assert!(!settings.startup_document_migration_enabled);
        assert!(!settings.database_migration_enabled);
    }

    #[test]
    fn test_empty_version_field_rejected() {
        assert!(matches!(
            MigrationSettings::new().with_version_field_name("  "),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_versioned_type_takes_declared_version_and_collection() {
        let settings = MigrationSettings::new()
            .with_versioned_type::<PinnedCar>(None)
            .unwrap();
        let car = settings.document_type("Car").unwrap();
        assert_eq!(car.collection.as_deref(), Some("cars"));
        assert_eq!(settings.write_version("Car"), Some(v("0.0.1")));
    }

    #[test]
    fn test_versioned_type_conflicting_pin_rejected() {
        let result = MigrationSettings::new().with_versioned_type::<PinnedCar>(Some(v("0.0.2")));
        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("declares runtime version 0.0.1")),
            _ => panic!("Expected Config error"),
        }
    }

    #[test]
    fn test_versioned_type_matching_pin_accepted() {
        let settings = MigrationSettings::new()
            .with_versioned_type::<PinnedCar>(Some(v("0.0.1")))
            .unwrap();
        assert_eq!(settings.write_version("Car"), Some(v("0.0.1")));
    }

    #[test]
    fn test_versioned_type_marks_entry_typed() {
        let settings = MigrationSettings::new()
            .with_versioned_type::<LatestCar>(None)
            .unwrap();
        let car = settings.document_type("Car").unwrap();
        assert!(car.typed);
        assert_eq!(car.runtime_version, None);
        assert_eq!(car.write_version, None);

        let untyped = MigrationSettings::new().with_document_type("Car");
        assert!(!untyped.document_type("Car").unwrap().typed);
    }

    #[test]
    fn test_versioned_type_conflicting_earlier_pin_rejected() {
        let result = MigrationSettings::new()
            .pin_write_version("Car", v("0.0.2"))
            .with_versioned_type::<PinnedCar>(None);
        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("pinned to write version 0.0.2")),
            _ => panic!("Expected Config error"),
        }
    }

    #[test]
    fn test_versioned_type_keeps_matching_earlier_pin() {
        let settings = MigrationSettings::new()
            .pin_write_version("Car", v("0.0.1"))
            .with_versioned_type::<PinnedCar>(None)
            .unwrap();
        assert_eq!(settings.write_version("Car"), Some(v("0.0.1")));
    }

    #[test]
    fn test_versioned_type_conflicting_registration_rejected() {
        let result = MigrationSettings::new()
            .with_versioned_type::<PinnedCar>(None)
            .unwrap()
            .with_versioned_type::<LatestCar>(None);
        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("already registered")),
            _ => panic!("Expected Config error"),
        }
    }

    #[test]
    fn test_validate_rejects_pin_overriding_declared_version() {
        let settings = MigrationSettings::new()
            .with_versioned_type::<PinnedCar>(None)
            .unwrap()
            .pin_write_version("Car", v("0.0.2"));
        match settings.validate(&car_migrations().document) {
            Err(Error::Config(msg)) => {
                assert!(msg.contains("declares runtime version 0.0.1"));
            }
            _ => panic!("Expected Config error"),
        }
    }

    #[test]
    fn test_validate_rejects_declared_version_beyond_latest() {
        let settings = MigrationSettings::new()
            .with_versioned_type::<FutureCar>(None)
            .unwrap();
        assert!(matches!(
            settings.validate(&car_migrations().document),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_validate_accepts_registered_pin() {
        let settings = MigrationSettings::new().pin_write_version("Car", v("0.0.1"));
        assert!(settings.validate(&car_migrations().document).is_ok());

        let default_pin = MigrationSettings::new().pin_write_version("Car", v("0.0.0"));
        assert!(default_pin.validate(&car_migrations().document).is_ok());
    }

    #[test]
    fn test_validate_rejects_pin_above_latest() {
        let settings = MigrationSettings::new().pin_write_version("Car", v("0.0.3"));
        assert!(matches!(
            settings.validate(&car_migrations().document),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_unregistered_pin() {
        let locator = MigrationRegistry::new()
            .document(MigrationStep::new("Car", v("0.0.1"), |_| Ok(())))
            .document(MigrationStep::new("Car", v("0.2.0"), |_| Ok(())))
            .build()
            .unwrap();
        let settings = MigrationSettings::new().pin_write_version("Car", v("0.1.0"));
        assert!(matches!(
            settings.validate(&locator.document),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_collection() {
        let settings = MigrationSettings::new().with_collection("Car", "");
        assert!(matches!(
            settings.validate(&car_migrations().document),
            Err(Error::Config(_))
        ));
    }
}
