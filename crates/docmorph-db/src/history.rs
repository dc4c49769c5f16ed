//! PostgreSQL migration ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use tracing::debug;

use docmorph_core::{
    DocumentVersion, Error, MigrationHistory, MigrationHistoryRepository, Result,
};

/// Primary key constraint of the `migration_history` table.
const MIGRATION_ID_CONSTRAINT: &str = "migration_history_pkey";

/// PostgreSQL migration history repository.
pub struct PgMigrationHistoryRepository {
    pool: Pool<Postgres>,
}

impl PgMigrationHistoryRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: &sqlx::postgres::PgRow) -> Result<MigrationHistory> {
        let version: String = row.get("version");
        let applied_at: DateTime<Utc> = row.get("applied_at");
        Ok(MigrationHistory {
            migration_id: row.get("migration_id"),
            version: DocumentVersion::parse(&version)?,
            applied_at,
        })
    }
}

#[async_trait]
impl MigrationHistoryRepository for PgMigrationHistoryRepository {
    async fn load(&self) -> Result<Vec<MigrationHistory>> {
        let rows = sqlx::query(
            "SELECT migration_id, version, applied_at
             FROM migration_history
             ORDER BY string_to_array(version, '.')::bigint[], applied_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::parse_row).collect()
    }

    async fn append(&self, record: MigrationHistory) -> Result<()> {
        sqlx::query(
            "INSERT INTO migration_history (migration_id, version, applied_at)
             VALUES ($1, $2, $3)",
        )
        .bind(&record.migration_id)
        .bind(record.version.to_string())
        .bind(record.applied_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.constraint() == Some(MIGRATION_ID_CONSTRAINT) {
                    return Error::DuplicateKey(format!(
                        "migration {} is already recorded",
                        record.migration_id
                    ));
                }
            }
            Error::Database(e)
        })?;

        debug!(
            subsystem = "db",
            component = "history",
            op = "append",
            migration_id = %record.migration_id,
            version = %record.version,
            "Recorded migration"
        );
        Ok(())
    }
}
