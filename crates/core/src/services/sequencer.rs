//! Forward-only height cursor driven by the chain head.
//!
//! The sequencer owns the next height to process. It only hands a height
//! out once the node reports a head at or above it; otherwise it sleeps for
//! the poll interval and asks again. A failed head query counts as head 0.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, instrument, trace, warn};

use crate::models::Checkpoint;
use crate::pool::NodePool;
use crate::ports::{ConnectionManager, NodeConnector};

/// First height to process.
///
/// A positive reset height wins, then the height after the checkpoint,
/// then 1.
pub fn initial_height(reset_height: Option<u64>, checkpoint: Option<&Checkpoint>) -> u64 {
    if let Some(height) = reset_height.filter(|h| *h > 0) {
        return height;
    }
    match checkpoint {
        Some(cp) if cp.current_height > 0 => cp.current_height + 1,
        _ => 1,
    }
}

pub struct HeightSequencer<M: ConnectionManager> {
    pool: Arc<NodePool<M>>,
    next: u64,
    /// Last head observed; heights up to it are emitted without asking again.
    known_head: u64,
    poll_interval: Duration,
}

impl<M: ConnectionManager> HeightSequencer<M> {
    pub fn new(pool: Arc<NodePool<M>>, start: u64, poll_interval: Duration) -> Self {
        Self {
            pool,
            next: start,
            known_head: 0,
            poll_interval,
        }
    }

    /// Height the next call to [`Self::next_ready`] will emit.
    pub fn next_height(&self) -> u64 {
        self.next
    }

    /// Wait until the cursor height exists on chain, emit it and advance.
    ///
    /// Returns `None` once shutdown is signalled.
    pub async fn next_ready(&mut self, shutdown: &mut watch::Receiver<bool>) -> Option<u64> {
        loop {
            if *shutdown.borrow() {
                return None;
            }

            if self.known_head >= self.next {
                let height = self.next;
                self.next += 1;
                return Some(height);
            }

            self.known_head = self.query_head().await;
            if self.known_head >= self.next {
                continue;
            }

            trace!(head = self.known_head, next = self.next, "Waiting for chain head");
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
            }
        }
    }

    async fn query_head(&self) -> u64 {
        let head = match self.pool.get().await {
            Ok(conn) => conn.chain_head_height().await,
            Err(e) => Err(e),
        };
        head.unwrap_or_else(|e| {
            warn!(error = %e, "⚠️  Chain head query failed");
            0
        })
    }

    /// Feed heights into `tx` until shutdown or until the consumer goes away.
    #[instrument(skip_all, fields(start = self.next))]
    pub async fn run(mut self, tx: mpsc::Sender<u64>, mut shutdown: watch::Receiver<bool>) {
        debug!("Sequencer started");
        loop {
            let ready = tokio::select! {
                height = self.next_ready(&mut shutdown) => height,
                _ = tx.closed() => None,
            };
            let Some(height) = ready else { break };

            tokio::select! {
                sent = tx.send(height) => {
                    if sent.is_err() {
                        debug!("Pipeline closed, sequencer stopping");
                        return;
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        debug!(next = self.next, "Sequencer stopped");
    }
}
