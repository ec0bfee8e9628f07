//! Port traits for the ledger node.
//!
//! These traits define the interface for fetching blocks, execution
//! results and the chain head from a node. Implementations live in the
//! infrastructure layer (e.g., `tidemark-tendermint`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ChainResult;
use crate::models::Event;

/// Raw block data from the node before decoding.
#[derive(Debug, Clone, Default)]
pub struct RawBlock {
    /// Block height.
    pub height: u64,
    /// Header time.
    pub time: Option<DateTime<Utc>>,
    /// Raw transaction envelopes, in block order.
    pub txs: Vec<Vec<u8>>,
}

/// Execution result of one transaction as reported by the node.
#[derive(Debug, Clone, Default)]
pub struct TxResult {
    /// Result code (0 = success).
    pub code: u32,
    /// Raw log.
    pub log: String,
    /// Emitted events, in order.
    pub events: Vec<Event>,
}

/// A single connection to a ledger node.
#[async_trait]
pub trait NodeConnector: Send + Sync {
    /// Fetch the block at `height`.
    async fn fetch_block(&self, height: u64) -> ChainResult<RawBlock>;

    /// Fetch the execution result of a transaction by its uppercase hex hash.
    async fn fetch_tx_result(&self, hash: &str) -> ChainResult<TxResult>;

    /// Latest block height known to the node.
    async fn chain_head_height(&self) -> ChainResult<u64>;
}

/// Factory for node connections, used by [`crate::pool::NodePool`].
#[async_trait]
pub trait ConnectionManager: Send + Sync + 'static {
    type Connection: NodeConnector + 'static;

    /// Open a new connection.
    async fn connect(&self) -> ChainResult<Self::Connection>;
}
