//! Checkpoint repository implementation for PostgreSQL.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use tidemark_core::error::{StorageError, StorageResult};
use tidemark_core::models::Checkpoint;
use tidemark_core::ports::CheckpointRepository;

use super::database::Database;
use super::helpers::{from_document, query_error};

/// PostgreSQL implementation of CheckpointRepository.
pub struct PgCheckpointRepository {
    pool: PgPool,
}

impl PgCheckpointRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }
}

#[async_trait]
impl CheckpointRepository for PgCheckpointRepository {
    async fn get_checkpoint(&self, task_id: &str) -> StorageResult<Option<Checkpoint>> {
        let row: Option<(Value,)> = sqlx::query_as("SELECT doc FROM sync_tasks WHERE id = $1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?;

        row.map(|(doc,)| from_document(doc, "checkpoint")).transpose()
    }

    async fn create_checkpoint(&self, checkpoint: &Checkpoint) -> StorageResult<bool> {
        let doc = serde_json::to_value(checkpoint)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO sync_tasks (id, doc)
            VALUES ($1, $2)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&checkpoint.id)
        .bind(&doc)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(result.rows_affected() == 1)
    }
}
