//! PostgreSQL storage adapter.
//!
//! This module implements the repository traits defined in `tidemark-core`
//! using PostgreSQL as a document store: each collection is a table holding
//! the JSONB document next to the key columns it is queried by.
//!
//! # Architecture
//!
//! - [`Database`] - Connection pool and migrations
//! - [`PgRepositories`] - Composite repository implementing `Repositories` trait
//! - [`PgCheckpointRepository`] - Sync task checkpoints
//!
//! # Usage
//!
//! ```ignore
//! let config = DatabaseConfig::for_indexer(&database_url);
//! let db = Database::connect(&config).await?;
//! db.migrate().await?;
//!
//! let repositories = PgRepositories::new(Arc::new(db));
//! ```

mod checkpoint_repo;
mod database;
mod helpers;

pub use checkpoint_repo::PgCheckpointRepository;
pub use database::{Database, DatabaseConfig};

use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use tidemark_core::error::{StorageError, StorageResult};
use tidemark_core::ports::{CheckpointRepository, Repositories, WriteOp};

use helpers::{insert_sql, query_error, update_sql};

// =============================================================================
// Composite Repository
// =============================================================================

/// Aggregated PostgreSQL repositories implementing the `Repositories` trait.
///
/// Batches run inside one SQL transaction; dropping the transaction on an
/// early return rolls it back.
pub struct PgRepositories {
    db: Arc<Database>,
    checkpoints: PgCheckpointRepository,
}

impl PgRepositories {
    /// Create a new repository aggregate from a database connection.
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            checkpoints: PgCheckpointRepository::new(&db),
            db,
        }
    }
}

#[async_trait]
impl Repositories for PgRepositories {
    fn checkpoints(&self) -> &dyn CheckpointRepository {
        &self.checkpoints
    }

    async fn run_atomic(&self, ops: &[WriteOp]) -> StorageResult<()> {
        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .map_err(|e| StorageError::TransactionError(e.to_string()))?;

        for op in ops {
            trace!(collection = %op.collection(), "Applying write");
            match op {
                WriteOp::Insert {
                    collection,
                    document,
                } => {
                    sqlx::query(insert_sql(*collection))
                        .bind(document)
                        .execute(&mut *tx)
                        .await
                        .map_err(query_error)?;
                }
                WriteOp::Update {
                    collection,
                    id,
                    assert_exists,
                    patch,
                } => {
                    let result = sqlx::query(update_sql(*collection))
                        .bind(id)
                        .bind(serde_json::Value::Object(patch.clone()))
                        .execute(&mut *tx)
                        .await
                        .map_err(query_error)?;

                    if *assert_exists && result.rows_affected() == 0 {
                        return Err(StorageError::AssertionFailed {
                            collection: collection.to_string(),
                            id: id.clone(),
                        });
                    }
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::TransactionError(e.to_string()))?;

        trace!(ops = ops.len(), "Atomic batch committed");
        Ok(())
    }
}
