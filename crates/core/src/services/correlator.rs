//! Execution result lookup for decoded transactions.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{instrument, warn};

use crate::error::ChainResult;
use crate::metrics::record_correlation_error;
use crate::models::{Event, TxStatus};
use crate::pool::NodePool;
use crate::ports::{ConnectionManager, NodeConnector, TxResult};

/// Event type carrying cross-chain packet attributes.
pub const SEND_PACKET_EVENT: &str = "send_packet";

/// Execution outcome of one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub status: TxStatus,
    pub code: u32,
    pub log: String,
    /// Every event, in emission order.
    pub events: Vec<Event>,
    /// The `send_packet` subset of `events`.
    pub packet_events: Vec<Event>,
}

/// Older SDKs omit `msg_index`; the entry position stands in for it.
#[derive(Deserialize)]
struct MessageLog {
    msg_index: Option<u32>,
    success: Option<bool>,
}

impl ExecutionResult {
    /// Result used when the node could not tell us anything.
    pub fn unknown() -> Self {
        Self {
            status: TxStatus::Unknown,
            code: 0,
            log: String::new(),
            events: Vec::new(),
            packet_events: Vec::new(),
        }
    }

    pub fn from_tx_result(result: TxResult) -> Self {
        let packet_events = result
            .events
            .iter()
            .filter(|e| e.kind == SEND_PACKET_EVENT)
            .cloned()
            .collect();
        Self {
            status: TxStatus::from_code(result.code),
            code: result.code,
            log: result.log,
            events: result.events,
            packet_events,
        }
    }

    /// Per-message outcomes from a raw log of `[{msg_index, success}]`.
    ///
    /// Returns an empty map when the log has another shape.
    pub fn message_statuses(&self) -> HashMap<u32, TxStatus> {
        serde_json::from_str::<Vec<MessageLog>>(&self.log)
            .map(|entries| {
                entries
                    .into_iter()
                    .zip(0u32..)
                    .filter_map(|(entry, position)| {
                        let status = match entry.success? {
                            true => TxStatus::Success,
                            false => TxStatus::Fail,
                        };
                        Some((entry.msg_index.unwrap_or(position), status))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub struct ResultCorrelator<M: ConnectionManager> {
    pool: Arc<NodePool<M>>,
}

impl<M: ConnectionManager> ResultCorrelator<M> {
    pub fn new(pool: Arc<NodePool<M>>) -> Self {
        Self { pool }
    }

    /// Query the execution result of `tx_hash`.
    ///
    /// Never fails: a lookup error yields [`ExecutionResult::unknown`].
    #[instrument(skip(self))]
    pub async fn correlate(&self, tx_hash: &str) -> ExecutionResult {
        match self.query(tx_hash).await {
            Ok(result) => ExecutionResult::from_tx_result(result),
            Err(e) => {
                warn!(error = %e, "⚠️  Execution result unavailable, status unknown");
                record_correlation_error();
                ExecutionResult::unknown()
            }
        }
    }

    async fn query(&self, tx_hash: &str) -> ChainResult<TxResult> {
        let conn = self.pool.get().await?;
        conn.fetch_tx_result(tx_hash).await
    }
}
