//! Storage layer for the Tidemark indexer.
//!
//! This crate provides PostgreSQL implementations of the repository traits
//! defined in `tidemark-core`: checkpoint access and the atomic multi-write
//! used to commit one height.
//!
//! # Usage
//!
//! ```ignore
//! use tidemark_storage::{Database, DatabaseConfig, PgRepositories};
//!
//! // Connect to the database
//! let config = DatabaseConfig::for_indexer(&database_url);
//! let db = Database::connect(&config).await?;
//!
//! // Run migrations
//! db.migrate().await?;
//!
//! // Create repositories
//! let repositories = Arc::new(PgRepositories::new(Arc::new(db)));
//! ```

pub mod postgres;

pub use postgres::{Database, DatabaseConfig, PgCheckpointRepository, PgRepositories};
