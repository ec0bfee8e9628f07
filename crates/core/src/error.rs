//! Error types for the indexer domain layer.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`DomainError`] - Decoding and validation errors
//! - [`StorageError`] - Database/repository errors
//! - [`ChainError`] - Node RPC errors
//! - [`IndexerError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! Only [`IndexerError`] ever reaches the process boundary. Per-envelope
//! and per-message failures are absorbed inside the decoder and never
//! escape as errors.

use thiserror::Error;

// =============================================================================
// Domain Errors
// =============================================================================

/// Decoding failures and domain rule violations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A block height of zero was handed to the persister.
    #[error("Invalid block height: {0}")]
    InvalidHeight(u64),

    /// Transaction envelope or message payload could not be decoded.
    #[error("Decoding error: {0}")]
    DecodingError(String),

    /// No transform registered for a message type.
    #[error("No transform registered for message type: {0}")]
    UnknownMessage(String),
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Database and repository errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to establish database connection.
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// SQL query execution failed.
    #[error("Query execution error: {0}")]
    QueryError(String),

    /// Database constraint was violated (unique height, etc.).
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// An update asserted that its target document exists, and it did not.
    #[error("Assertion failed: {collection} document '{id}' does not exist")]
    AssertionFailed {
        /// Collection the update targeted.
        collection: String,
        /// Document id the update targeted.
        id: String,
    },

    /// Database migration failed.
    #[error("Migration error: {0}")]
    MigrationError(String),

    /// A collection table is absent from the connected database.
    #[error("Collection '{0}' is missing from the database schema")]
    MissingCollection(String),

    /// Transaction begin/commit failed.
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// Document serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

// =============================================================================
// Chain Errors
// =============================================================================

/// Node RPC and connectivity errors.
///
/// All of these are treated as transient by the fetcher, which retries
/// once on a fresh connection before giving up on the height.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Could not create a node connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// RPC request failed or the node answered with an error.
    #[error("RPC error: {0}")]
    RpcError(String),

    /// The node answered with a payload we could not interpret.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Block could not be fetched.
    #[error("Block fetch error at height {height}: {message}")]
    BlockFetchError {
        /// Height that failed to fetch.
        height: u64,
        /// Error details.
        message: String,
    },

    /// The connection pool is closed.
    #[error("Connection pool closed")]
    PoolClosed,
}

// =============================================================================
// Indexer Errors
// =============================================================================

/// Top-level indexer orchestration errors.
///
/// This is the main error type returned by [`crate::services::IngestionPipeline`].
/// Every variant except [`IndexerError::ShutdownRequested`] is fatal for the
/// process.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Domain logic error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Storage/database error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Node connectivity error.
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The sequencer handed over a height out of order.
    #[error("Height out of order: expected {expected}, got {got}")]
    HeightOutOfOrder {
        /// Height the pipeline expected next.
        expected: u64,
        /// Height it received.
        got: u64,
    },

    /// Graceful shutdown was requested.
    ///
    /// This is not really an error but uses the error type for control flow.
    #[error("Indexer shutdown requested")]
    ShutdownRequested,

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for indexer operations.
pub type IndexerResult<T> = Result<T, IndexerError>;

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;
