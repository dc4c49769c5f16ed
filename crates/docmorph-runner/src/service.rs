//! Migration service.
//!
//! Wires settings, the registered migrations and the ledger together once at
//! startup and hands out the runners and the interceptor built on them.

use std::sync::Arc;

use tracing::{info, instrument};

use docmorph_core::{
    DocumentInterceptor, DocumentMigrationRunner, DocumentStore, MigrationHistoryRepository,
    MigrationSettings, Migrations, Result,
};

use crate::database::{DatabaseMigrationRunner, DatabaseRunReport};
use crate::signal::CancelSignal;
use crate::startup::{StartupDocumentMigrationRunner, SweepReport};

/// What [`MigrationService::run_startup`] did. A phase that did not run is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupReport {
    pub database: Option<DatabaseRunReport>,
    pub sweep: Option<SweepReport>,
}

impl StartupReport {
    /// Whether either phase stopped on the cancel signal.
    pub fn cancelled(&self) -> bool {
        self.database.as_ref().is_some_and(|r| r.cancelled)
            || self.sweep.as_ref().is_some_and(|r| r.cancelled)
    }
}

/// Entry point for applications.
///
/// ```rust,ignore
/// let service = MigrationService::new(settings, migrations, db.history.clone())?;
/// service.run_startup(db.documents.as_ref(), &CancelSignal::never()).await?;
/// let cars = VersionedCollection::<Car>::for_type(db.documents.clone(), service.interceptor())?;
/// ```
#[derive(Clone)]
pub struct MigrationService {
    settings: Arc<MigrationSettings>,
    migrations: Migrations,
    history: Arc<dyn MigrationHistoryRepository>,
}

impl MigrationService {
    /// Finalise `settings` and check them against the registered migrations.
    pub fn new(
        settings: MigrationSettings,
        migrations: Migrations,
        history: Arc<dyn MigrationHistoryRepository>,
    ) -> Result<Self> {
        let settings = settings.resolve();
        settings.validate(&migrations.document)?;

        info!(
            subsystem = "migrations",
            component = "service",
            version_field = %settings.version_field_name,
            runtime = settings.runtime_migration_enabled,
            startup = settings.startup_document_migration_enabled,
            database = settings.database_migration_enabled,
            database_baseline = %settings.database_baseline,
            "Migration service configured"
        );

        Ok(Self {
            settings: Arc::new(settings),
            migrations,
            history,
        })
    }

    pub fn settings(&self) -> &MigrationSettings {
        &self.settings
    }

    pub fn migrations(&self) -> &Migrations {
        &self.migrations
    }

    pub fn document_runner(&self) -> DocumentMigrationRunner {
        DocumentMigrationRunner::new(
            self.migrations.document.clone(),
            self.settings.version_field_name.clone(),
        )
    }

    /// Interceptor for the serialization boundary. Writes are always stamped;
    /// reads pass through unmigrated when runtime migration is disabled.
    pub fn interceptor(&self) -> DocumentInterceptor {
        DocumentInterceptor::new(self.document_runner(), self.settings.clone())
    }

    pub fn database_runner(&self) -> DatabaseMigrationRunner {
        DatabaseMigrationRunner::new(self.migrations.database.clone(), self.history.clone())
    }

    pub fn startup_runner(&self) -> StartupDocumentMigrationRunner {
        StartupDocumentMigrationRunner::new(self.interceptor())
    }

    /// Run the enabled startup phases: database migrations, then the sweep.
    ///
    /// The sweep is skipped when the database phase was cancelled.
    #[instrument(
        skip(self, store, cancel),
        fields(subsystem = "migrations", component = "service", op = "run_startup")
    )]
    pub async fn run_startup(
        &self,
        store: &dyn DocumentStore,
        cancel: &CancelSignal,
    ) -> Result<StartupReport> {
        let mut report = StartupReport::default();

        if self.settings.database_migration_enabled {
            let database = self
                .database_runner()
                .run(store, self.settings.database_baseline, cancel)
                .await?;
            let cancelled = database.cancelled;
            report.database = Some(database);
            if cancelled {
                return Ok(report);
            }
        }

        if self.settings.startup_document_migration_enabled {
            report.sweep = Some(self.startup_runner().run_all(store, cancel).await?);
        }

        Ok(report)
    }
}
