//! Port traits for the document store.
//!
//! The domain layer only needs two things from storage: reading and
//! bootstrapping the checkpoint, and applying a batch of writes atomically.
//! Implementations live in the infrastructure layer (e.g., `tidemark-storage`).

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{StorageError, StorageResult};
use crate::models::Checkpoint;

// =============================================================================
// Write Operations
// =============================================================================

/// Logical document collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Blocks,
    Transactions,
    SyncTasks,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Self::Blocks, Self::Transactions, Self::SyncTasks];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Blocks => "sync_blocks",
            Self::Transactions => "sync_txs",
            Self::SyncTasks => "sync_tasks",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One write inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert a new document.
    Insert {
        collection: Collection,
        document: Value,
    },
    /// Merge `patch` into the document `id`.
    ///
    /// With `assert_exists` set, a missing document fails the whole batch.
    Update {
        collection: Collection,
        id: String,
        assert_exists: bool,
        patch: Map<String, Value>,
    },
}

impl WriteOp {
    /// Insert operation for a serializable record.
    pub fn insert<T: Serialize>(collection: Collection, record: &T) -> StorageResult<Self> {
        let document = serde_json::to_value(record)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        Ok(Self::Insert {
            collection,
            document,
        })
    }

    pub fn collection(&self) -> Collection {
        match self {
            Self::Insert { collection, .. } | Self::Update { collection, .. } => *collection,
        }
    }
}

// =============================================================================
// Repository Traits
// =============================================================================

/// Repository for sync task checkpoints.
#[async_trait]
pub trait CheckpointRepository: Send + Sync {
    /// Get the checkpoint of a sync task.
    async fn get_checkpoint(&self, task_id: &str) -> StorageResult<Option<Checkpoint>>;

    /// Insert the checkpoint unless one already exists for its id.
    /// Returns `true` when a document was created.
    async fn create_checkpoint(&self, checkpoint: &Checkpoint) -> StorageResult<bool>;
}

/// Combined repository access for the pipeline.
#[async_trait]
pub trait Repositories: Send + Sync {
    /// Access the checkpoint repository.
    fn checkpoints(&self) -> &dyn CheckpointRepository;

    /// Apply every operation or none of them.
    ///
    /// Operations run in order inside one storage transaction. Any failure
    /// (constraint violation, failed existence assertion, I/O) rolls the
    /// whole batch back.
    async fn run_atomic(&self, ops: &[WriteOp]) -> StorageResult<()>;
}
