//! All-or-nothing commit of one processed height.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{instrument, trace};

use crate::error::{DomainError, IndexerResult, StorageError, StorageResult};
use crate::models::{Block, Checkpoint, Transaction};
use crate::ports::{Collection, Repositories, WriteOp};

pub struct AtomicPersister<R: Repositories> {
    repositories: Arc<R>,
}

impl<R: Repositories> AtomicPersister<R> {
    pub fn new(repositories: Arc<R>) -> Self {
        Self { repositories }
    }

    /// Commit a block, its transactions and the checkpoint update as one batch.
    ///
    /// Height zero is rejected before any I/O. A second commit of the same
    /// height fails on the unique height key.
    #[instrument(skip_all, fields(height = block.height, txs = transactions.len()))]
    pub async fn commit(
        &self,
        block: &Block,
        transactions: &[Transaction],
        checkpoint: &Checkpoint,
    ) -> IndexerResult<()> {
        if block.height == 0 {
            return Err(DomainError::InvalidHeight(0).into());
        }

        let ops = build_ops(block, transactions, checkpoint)?;
        self.repositories.run_atomic(&ops).await?;
        trace!(ops = ops.len(), "Batch committed");
        Ok(())
    }
}

/// Block insert, then every transaction insert, then the checkpoint update.
pub fn build_ops(
    block: &Block,
    transactions: &[Transaction],
    checkpoint: &Checkpoint,
) -> StorageResult<Vec<WriteOp>> {
    let mut ops = Vec::with_capacity(transactions.len() + 2);
    ops.push(WriteOp::insert(Collection::Blocks, block)?);
    for tx in transactions {
        ops.push(WriteOp::insert(Collection::Transactions, tx)?);
    }
    ops.push(checkpoint_update(checkpoint)?);
    Ok(ops)
}

fn checkpoint_update(checkpoint: &Checkpoint) -> StorageResult<WriteOp> {
    let to_value = |v: Result<Value, serde_json::Error>| {
        v.map_err(|e| StorageError::SerializationError(e.to_string()))
    };

    let mut patch = Map::new();
    patch.insert("current_height".into(), Value::from(checkpoint.current_height));
    patch.insert("status".into(), to_value(serde_json::to_value(checkpoint.status))?);
    patch.insert(
        "last_update_time".into(),
        to_value(serde_json::to_value(checkpoint.last_update_time))?,
    );

    Ok(WriteOp::Update {
        collection: Collection::SyncTasks,
        id: checkpoint.id.clone(),
        assert_exists: true,
        patch,
    })
}
