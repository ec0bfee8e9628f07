//! Block retrieval with a single retry on a fresh connection.

use std::sync::Arc;

use tracing::{instrument, trace, warn};

use crate::error::ChainResult;
use crate::metrics::record_fetch_retry;
use crate::pool::NodePool;
use crate::ports::{ConnectionManager, NodeConnector, RawBlock};

pub struct BlockFetcher<M: ConnectionManager> {
    pool: Arc<NodePool<M>>,
}

impl<M: ConnectionManager> BlockFetcher<M> {
    pub fn new(pool: Arc<NodePool<M>>) -> Self {
        Self { pool }
    }

    /// Fetch the block at `height`.
    ///
    /// A failed attempt discards its connection and is retried exactly once
    /// on a freshly borrowed one. The second error is returned as is.
    #[instrument(skip(self))]
    pub async fn fetch(&self, height: u64) -> ChainResult<RawBlock> {
        let conn = self.pool.get().await?;
        let first = conn.fetch_block(height).await;
        let err = match first {
            Ok(block) => {
                trace!(txs = block.txs.len(), "Block fetched");
                return Ok(block);
            }
            Err(e) => e,
        };

        conn.discard();
        warn!(error = %err, "⚠️  Block fetch failed, retrying on a fresh connection");
        record_fetch_retry();

        let retry_conn = self.pool.get().await?;
        let block = retry_conn.fetch_block(height).await?;
        trace!(txs = block.txs.len(), "Block fetched on retry");
        Ok(block)
    }
}
