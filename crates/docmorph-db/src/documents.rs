//! PostgreSQL document store.
//!
//! Documents live in one table keyed by collection. Bodies are kept in a
//! `JSON` column rather than `JSONB` so field order survives a round trip.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use docmorph_core::{Document, DocumentStore, Error, Result, StoredDocument};

/// PostgreSQL document store.
pub struct PgDocumentStore {
    pool: Pool<Postgres>,
}

impl PgDocumentStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_body(body: &str) -> Result<Document> {
        Document::from_slice(body.as_bytes())
    }

    fn stored_from_row(row: &PgRow) -> Result<StoredDocument> {
        let body: String = row.get("body");
        Ok(StoredDocument {
            id: row.get("id"),
            document: Self::parse_body(&body)?,
        })
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn list_collections(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT DISTINCT collection FROM docmorph_document ORDER BY collection",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(|r| r.get("collection")).collect())
    }

    async fn find_all(&self, collection: &str) -> Result<Vec<StoredDocument>> {
        let rows = sqlx::query(
            "SELECT id, body::text AS body
             FROM docmorph_document
             WHERE collection = $1
             ORDER BY seq",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::stored_from_row).collect()
    }

    async fn find_page(
        &self,
        collection: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<StoredDocument>> {
        let rows = sqlx::query(
            "SELECT id, body::text AS body
             FROM docmorph_document
             WHERE collection = $1
             ORDER BY seq
             OFFSET $2 LIMIT $3",
        )
        .bind(collection)
        .bind(offset as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(Self::stored_from_row).collect()
    }

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT body::text AS body FROM docmorph_document WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(r) => {
                let body: String = r.get("body");
                Ok(Some(Self::parse_body(&body)?))
            }
            None => Ok(None),
        }
    }

    async fn insert(&self, collection: &str, document: Document) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let body = serde_json::to_string(document.as_map())?;
        sqlx::query(
            "INSERT INTO docmorph_document (id, collection, body, created_at, updated_at)
             VALUES ($1, $2, $3::json, $4, $5)",
        )
        .bind(id)
        .bind(collection)
        .bind(body)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(id)
    }

    async fn replace(&self, collection: &str, id: Uuid, document: Document) -> Result<()> {
        let body = serde_json::to_string(document.as_map())?;
        let result = sqlx::query(
            "UPDATE docmorph_document SET body = $1::json, updated_at = $2
             WHERE collection = $3 AND id = $4",
        )
        .bind(body)
        .bind(Utc::now())
        .bind(collection)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "document {} in collection {}",
                id, collection
            )));
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM docmorph_document WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn drop_collection(&self, collection: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM docmorph_document WHERE collection = $1")
            .bind(collection)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}
