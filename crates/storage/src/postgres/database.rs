//! PostgreSQL pool for the single-writer ingestion pipeline.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, instrument};

use tidemark_core::error::{StorageError, StorageResult};
use tidemark_core::ports::Collection;

/// The pipeline holds at most one commit transaction, plus the checkpoint
/// read at bootstrap.
const WRITER_CONNECTIONS: u32 = 2;

/// Pool settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// How long a commit waits for a free connection before failing the
    /// height.
    pub acquire_timeout: Duration,
    /// Recycle connections after this long, so failovers behind a proxy are
    /// picked up.
    pub max_lifetime: Duration,
}

impl DatabaseConfig {
    /// Settings for one pipeline writing heights sequentially.
    pub fn for_indexer(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: WRITER_CONNECTIONS,
            acquire_timeout: Duration::from_secs(30),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// Connection pool over the `sync_*` collections.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    #[instrument(skip_all, fields(max_conn = config.max_connections))]
    pub async fn connect(config: &DatabaseConfig) -> StorageResult<Self> {
        // The writer connection stays warm between heights.
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(1)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(None)
            .max_lifetime(Some(config.max_lifetime))
            .connect(&config.url)
            .await
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;

        debug!("Connection pool created");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn migrate(&self) -> StorageResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::MigrationError(e.to_string()))
    }

    /// Check that every collection table exists.
    ///
    /// Used when migrations are managed outside the indexer: a missing table
    /// would otherwise only surface at the first commit.
    #[instrument(skip(self))]
    pub async fn verify_schema(&self) -> StorageResult<()> {
        for collection in Collection::ALL {
            let (found,): (Option<String>,) = sqlx::query_as("SELECT to_regclass($1)::TEXT")
                .bind(collection.name())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| StorageError::QueryError(e.to_string()))?;

            if found.is_none() {
                return Err(StorageError::MissingCollection(collection.name().to_string()));
            }
        }

        info!(collections = Collection::ALL.len(), "🗄️  Schema verified");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test critique: un seul écrivain, le pool ne doit pas dépasser deux connexions
    #[test]
    fn test_indexer_pool_is_single_writer() {
        let config = DatabaseConfig::for_indexer("postgres://localhost/tidemark");
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.url, "postgres://localhost/tidemark");
        assert!(config.acquire_timeout < config.max_lifetime);
    }

    #[test]
    fn test_missing_collection_names_the_table() {
        let err = StorageError::MissingCollection(Collection::Transactions.name().to_string());
        assert_eq!(err.to_string(), "Collection 'sync_txs' is missing from the database schema");
    }
}
