//! src/services/metadata_store.rs
//!
//! Partitioned metadata storage for image records. `SqliteMetadataStore`
//! keeps one row per image keyed by `(user_id, id)`; every read and delete
//! is scoped to a single partition.

use crate::models::image::ImageRecord;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

const INIT_SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("document `{id}` not found in partition `{partition}`")]
    NotFound { id: String, partition: String },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type MetadataResult<T> = Result<T, MetadataError>;

/// Document collection partitioned by user identity.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert the record, or replace the one with the same `(user_id, id)`.
    async fn upsert(&self, record: &ImageRecord) -> MetadataResult<()>;

    /// Every record stored under `partition`, unordered.
    async fn query_partition(&self, partition: &str) -> MetadataResult<Vec<ImageRecord>>;

    /// Remove the record `id` from `partition`. Fails with `NotFound` when
    /// no such record exists.
    async fn delete(&self, id: &str, partition: &str) -> MetadataResult<()>;

    async fn check_health(&self) -> MetadataResult<()>;
}

#[derive(Clone)]
pub struct SqliteMetadataStore {
    db: Arc<SqlitePool>,
}

impl SqliteMetadataStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Apply the bundled schema. Safe to run repeatedly.
    pub async fn migrate(&self) -> MetadataResult<()> {
        let statements = INIT_SCHEMA
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        tracing::info!("Running {} migration statements...", statements.len());

        for stmt in statements {
            debug!("Executing migration SQL: {}", stmt);
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn upsert(&self, record: &ImageRecord) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT INTO image_metadata (
                id, user_id, url, caption, folder, location, lat, lon
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, id) DO UPDATE SET
                url = excluded.url,
                caption = excluded.caption,
                folder = excluded.folder,
                location = excluded.location,
                lat = excluded.lat,
                lon = excluded.lon
            "#,
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.url)
        .bind(&record.caption)
        .bind(&record.folder)
        .bind(&record.location)
        .bind(record.lat)
        .bind(record.lon)
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    async fn query_partition(&self, partition: &str) -> MetadataResult<Vec<ImageRecord>> {
        let rows = sqlx::query_as::<_, ImageRecord>(
            "SELECT id, user_id, url, caption, folder, location, lat, lon
             FROM image_metadata WHERE user_id = ?",
        )
        .bind(partition)
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    async fn delete(&self, id: &str, partition: &str) -> MetadataResult<()> {
        let result = sqlx::query("DELETE FROM image_metadata WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(partition)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound {
                id: id.to_string(),
                partition: partition.to_string(),
            });
        }
        Ok(())
    }

    async fn check_health(&self) -> MetadataResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}
