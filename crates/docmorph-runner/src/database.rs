//! Database migration runner.
//!
//! Applies every registered database migration above a baseline that the
//! ledger does not already record, strictly in ascending version order, and
//! appends a ledger record after each success. Re-running is safe: recorded
//! migrations are skipped, so an interrupted run resumes where it stopped.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, instrument, warn};

use docmorph_core::{
    DatabaseMigrationLocator, DocumentStore, DocumentVersion, MigrationHistory,
    MigrationHistoryRepository, Result, DATABASE_TARGET,
};

use crate::signal::CancelSignal;

/// What a database migration run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseRunReport {
    /// Ledger records appended by this run, in application order.
    pub applied: Vec<MigrationHistory>,
    /// Migrations above the baseline the ledger already recorded.
    pub skipped: usize,
    /// Whether the run stopped on the cancel signal before finishing.
    pub cancelled: bool,
}

/// Runs pending database migrations against a store.
#[derive(Clone)]
pub struct DatabaseMigrationRunner {
    locator: Arc<DatabaseMigrationLocator>,
    history: Arc<dyn MigrationHistoryRepository>,
}

impl DatabaseMigrationRunner {
    pub fn new(
        locator: Arc<DatabaseMigrationLocator>,
        history: Arc<dyn MigrationHistoryRepository>,
    ) -> Self {
        Self { locator, history }
    }

    /// Apply pending migrations with version above `baseline`.
    ///
    /// Stops at the first failure and returns that migration's error; later
    /// migrations are not attempted and the failed one is not recorded.
    #[instrument(
        skip(self, store, cancel),
        fields(subsystem = "migrations", component = "database_runner", op = "run", baseline = %baseline)
    )]
    pub async fn run(
        &self,
        store: &dyn DocumentStore,
        baseline: DocumentVersion,
        cancel: &CancelSignal,
    ) -> Result<DatabaseRunReport> {
        let start = Instant::now();
        let recorded: HashSet<String> = self
            .history
            .load()
            .await?
            .into_iter()
            .map(|record| record.migration_id)
            .collect();

        let pending = self.locator.migrations_between(
            DATABASE_TARGET,
            baseline,
            self.locator.latest_version(DATABASE_TARGET),
        );

        let mut report = DatabaseRunReport::default();
        for migration in pending {
            let migration_id = migration.id();
            if recorded.contains(&migration_id) {
                debug!(
                    migration_id = %migration_id,
                    version = %migration.version(),
                    "Migration already applied, skipping"
                );
                report.skipped += 1;
                continue;
            }

            if cancel.is_cancelled() {
                warn!(
                    applied = report.applied.len(),
                    next_migration = %migration_id,
                    "Database migration run cancelled"
                );
                report.cancelled = true;
                break;
            }

            let step_start = Instant::now();
            if let Err(e) = migration.up(store).await {
                error!(
                    migration_id = %migration_id,
                    version = %migration.version(),
                    error = %e,
                    "Database migration failed"
                );
                return Err(e);
            }

            let record = MigrationHistory::applied_now(migration_id, migration.version());
            self.history.append(record.clone()).await?;
            info!(
                migration_id = %record.migration_id,
                version = %record.version,
                duration_ms = step_start.elapsed().as_millis() as u64,
                "Database migration applied"
            );
            report.applied.push(record);
        }

        info!(
            applied = report.applied.len(),
            skipped = report.skipped,
            cancelled = report.cancelled,
            duration_ms = start.elapsed().as_millis() as u64,
            "Database migration run finished"
        );
        Ok(report)
    }
}
