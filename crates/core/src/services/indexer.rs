//! Ingestion pipeline - orchestrates height processing.
//!
//! Two long-lived tasks cooperate through a channel of capacity 1: the
//! [`HeightSequencer`] produces heights, the pipeline consumes them one at
//! a time. Any error while processing a height stops the pipeline; the
//! checkpoint is left at the last committed height and a restart resumes
//! from there.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument};

use crate::error::{ChainError, IndexerError, IndexerResult};
use crate::metrics::{ProcessingTimer, record_block_indexed};
use crate::models::{Block, Checkpoint};
use crate::pool::NodePool;
use crate::ports::{ChainProfile, ConnectionManager, Repositories};
use crate::services::correlator::ResultCorrelator;
use crate::services::decoder::TransactionDecoder;
use crate::services::fetcher::BlockFetcher;
use crate::services::persister::AtomicPersister;
use crate::services::sequencer::{HeightSequencer, initial_height};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Id of the checkpoint document.
    pub task_id: String,
    /// Start here instead of after the checkpoint.
    pub reset_height: Option<u64>,
    /// Sleep between head queries while waiting for new blocks.
    pub poll_interval: Duration,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            task_id: "sync_task".to_string(),
            reset_height: None,
            poll_interval: Duration::from_secs(1),
        }
    }
}

// =============================================================================
// IngestionPipeline
// =============================================================================

/// Sequential block ingestion.
///
/// # Flow
///
/// 1. Ensure the checkpoint exists and derive the start height
/// 2. Spawn the sequencer
/// 3. For each height: fetch, decode, commit block + transactions +
///    checkpoint atomically
/// 4. Stop on shutdown or on the first unrecoverable error
pub struct IngestionPipeline<M: ConnectionManager, R: Repositories> {
    config: IndexerConfig,
    pool: Arc<NodePool<M>>,
    repositories: Arc<R>,
    profile_name: String,
    fetcher: BlockFetcher<M>,
    decoder: TransactionDecoder<M>,
    persister: AtomicPersister<R>,
}

impl<M: ConnectionManager, R: Repositories> IngestionPipeline<M, R> {
    pub fn new(
        config: IndexerConfig,
        pool: Arc<NodePool<M>>,
        repositories: Arc<R>,
        profile: ChainProfile,
    ) -> Self {
        Self {
            profile_name: profile.name.clone(),
            fetcher: BlockFetcher::new(pool.clone()),
            decoder: TransactionDecoder::new(profile, ResultCorrelator::new(pool.clone())),
            persister: AtomicPersister::new(repositories.clone()),
            config,
            pool,
            repositories,
        }
    }

    /// Run until shutdown or a fatal error.
    ///
    /// Returns [`IndexerError::ShutdownRequested`] on a clean stop.
    #[instrument(skip_all, fields(task = %self.config.task_id, profile = %self.profile_name))]
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) -> IndexerResult<()> {
        info!("⛓️  Starting ingestion");

        let mut checkpoint = self.bootstrap_checkpoint().await?;
        let start = initial_height(self.config.reset_height, Some(&checkpoint));
        info!(
            start,
            checkpoint = checkpoint.current_height,
            reset = ?self.config.reset_height,
            "▶️  Sequencer seeded"
        );

        let (tx, mut rx) = mpsc::channel(1);
        let sequencer = HeightSequencer::new(self.pool.clone(), start, self.config.poll_interval);
        let sequencer_task = tokio::spawn(sequencer.run(tx, shutdown_rx.clone()));

        let mut expected = start;
        let outcome = loop {
            tokio::select! {
                biased;
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        debug!("Shutdown requested");
                        break Err(IndexerError::ShutdownRequested);
                    }
                }
                next = rx.recv() => {
                    let Some(height) = next else {
                        break if *shutdown_rx.borrow() {
                            Err(IndexerError::ShutdownRequested)
                        } else {
                            Err(IndexerError::Internal("sequencer stopped unexpectedly".into()))
                        };
                    };

                    if height != expected {
                        break Err(IndexerError::HeightOutOfOrder { expected, got: height });
                    }

                    match self.process_height(height, &checkpoint).await {
                        Ok(next_checkpoint) => {
                            checkpoint = next_checkpoint;
                            expected += 1;
                        }
                        Err(e) => {
                            error!(block = height, error = %e, "❌ Block processing failed, halting");
                            break Err(e);
                        }
                    }
                }
            }
        };

        sequencer_task.abort();
        outcome
    }

    /// Load the checkpoint, creating it on first start.
    async fn bootstrap_checkpoint(&self) -> IndexerResult<Checkpoint> {
        let checkpoints = self.repositories.checkpoints();
        if let Some(existing) = checkpoints.get_checkpoint(&self.config.task_id).await? {
            debug!(height = existing.current_height, "Checkpoint found");
            return Ok(existing);
        }

        let fresh = Checkpoint::bootstrap(self.config.task_id.clone());
        if checkpoints.create_checkpoint(&fresh).await? {
            info!("🆕 Checkpoint created");
            return Ok(fresh);
        }

        // Created concurrently between the two calls.
        checkpoints
            .get_checkpoint(&self.config.task_id)
            .await?
            .ok_or_else(|| IndexerError::Internal("checkpoint vanished after creation".into()))
    }

    /// Fetch, decode and commit one height. Returns the new checkpoint.
    #[instrument(skip(self, checkpoint))]
    async fn process_height(&self, height: u64, checkpoint: &Checkpoint) -> IndexerResult<Checkpoint> {
        let _timer = ProcessingTimer::new();

        let raw = self.fetcher.fetch(height).await?;
        if raw.height != height {
            return Err(ChainError::MalformedResponse(format!(
                "asked for block {}, node returned {}",
                height, raw.height
            ))
            .into());
        }

        let transactions = self.decoder.decode_block(&raw).await;
        let block = Block {
            height,
            time: raw.time,
            tx_count: raw.txs.len() as u32,
            created_at: Utc::now(),
        };
        let next = checkpoint.advanced_to(height);

        self.persister.commit(&block, &transactions, &next).await?;

        record_block_indexed(height);
        info!(
            block = height,
            envelopes = block.tx_count,
            txs = transactions.len(),
            "⛓️  Block indexed"
        );
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::models::TaskStatus;
    use crate::pool::PoolConfig;
    use crate::testing::{
        FakeChain, FakeManager, MemoryRepositories, envelope_bytes, send_msg, test_profile,
    };
    use std::sync::atomic::Ordering;

    type TestPipeline = IngestionPipeline<FakeManager, MemoryRepositories>;

    async fn pipeline(
        chain: Arc<FakeChain>,
        repos: Arc<MemoryRepositories>,
        reset_height: Option<u64>,
    ) -> Arc<TestPipeline> {
        let pool = NodePool::new(FakeManager::new(chain), PoolConfig { initial_size: 1, max_size: 4 })
            .await
            .unwrap();
        let config = IndexerConfig {
            task_id: "task".into(),
            reset_height,
            poll_interval: Duration::from_millis(10),
        };
        Arc::new(IngestionPipeline::new(config, Arc::new(pool), repos, test_profile(false)))
    }

    fn chain_with_blocks(heights: std::ops::RangeInclusive<u64>) -> Arc<FakeChain> {
        let chain = Arc::new(FakeChain::with_head(*heights.end()));
        for h in heights {
            let raw = envelope_bytes(&format!("block {}", h), &[send_msg("a", "b", "1")]);
            chain.add_block(h, vec![raw]);
        }
        chain
    }

    async fn wait_for_height(repos: &MemoryRepositories, height: u64) {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let cp = repos.checkpoints().get_checkpoint("task").await.unwrap();
                if cp.is_some_and(|cp| cp.current_height >= height) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("pipeline did not reach height");
    }

    // Test critique: progression monotone sans trou, checkpoint = dernière hauteur
    #[tokio::test]
    async fn test_processes_heights_in_order_until_shutdown() {
        let chain = chain_with_blocks(1..=3);
        let repos = Arc::new(MemoryRepositories::default());
        let pipeline = pipeline(chain, repos.clone(), None).await;
        let (stop, shutdown) = watch::channel(false);

        let task = tokio::spawn({
            let pipeline = pipeline.clone();
            async move { pipeline.run(shutdown).await }
        });

        wait_for_height(&repos, 3).await;
        stop.send(true).unwrap();
        let result = task.await.unwrap();
        assert!(matches!(result, Err(IndexerError::ShutdownRequested)));

        let state = repos.snapshot();
        assert_eq!(state.blocks.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(state.txs.len(), 3);
        for tx in &state.txs {
            assert_eq!(tx["memo"], format!("block {}", tx["height"]));
        }
        let cp = repos.checkpoints().get_checkpoint("task").await.unwrap().unwrap();
        assert_eq!(cp.current_height, 3);
        assert_eq!(cp.status, TaskStatus::Underway);
    }

    // Test critique: reprise après le checkpoint, sans retraiter la dernière hauteur
    #[tokio::test]
    async fn test_resumes_after_checkpoint() {
        let chain = chain_with_blocks(1..=3);
        let repos = Arc::new(MemoryRepositories::default());
        repos
            .checkpoints()
            .create_checkpoint(&Checkpoint::bootstrap("task").advanced_to(2))
            .await
            .unwrap();

        let pipeline = pipeline(chain.clone(), repos.clone(), None).await;
        let (stop, shutdown) = watch::channel(false);
        let task = tokio::spawn({
            let pipeline = pipeline.clone();
            async move { pipeline.run(shutdown).await }
        });

        wait_for_height(&repos, 3).await;
        stop.send(true).unwrap();
        task.await.unwrap().unwrap_err();

        assert_eq!(repos.snapshot().blocks.keys().copied().collect::<Vec<_>>(), vec![3]);
    }

    #[tokio::test]
    async fn test_reset_height_overrides_checkpoint() {
        let chain = chain_with_blocks(1..=5);
        let repos = Arc::new(MemoryRepositories::default());
        let pipeline = pipeline(chain, repos.clone(), Some(4)).await;
        let (stop, shutdown) = watch::channel(false);
        let task = tokio::spawn({
            let pipeline = pipeline.clone();
            async move { pipeline.run(shutdown).await }
        });

        wait_for_height(&repos, 5).await;
        stop.send(true).unwrap();
        task.await.unwrap().unwrap_err();

        assert_eq!(repos.snapshot().blocks.keys().copied().collect::<Vec<_>>(), vec![4, 5]);
    }

    // Test critique: échec de récupération après retry = arrêt, checkpoint inchangé
    #[tokio::test]
    async fn test_fetch_failure_is_fatal() {
        let chain = chain_with_blocks(1..=2);
        chain.blocks.lock().remove(&2);
        let repos = Arc::new(MemoryRepositories::default());
        let pipeline = pipeline(chain.clone(), repos.clone(), None).await;
        let (_stop, shutdown) = watch::channel(false);

        let result = pipeline.run(shutdown).await;
        assert!(matches!(result, Err(IndexerError::Chain(_))));
        // une tentative pour 1, deux pour 2
        assert_eq!(chain.block_calls.load(Ordering::SeqCst), 3);

        let cp = repos.checkpoints().get_checkpoint("task").await.unwrap().unwrap();
        assert_eq!(cp.current_height, 1);
    }

    // Test critique: échec de persistance = arrêt, aucune écriture partielle
    #[tokio::test]
    async fn test_persistence_failure_is_fatal() {
        let chain = chain_with_blocks(1..=1);
        let repos = Arc::new(MemoryRepositories::default());
        repos.fail_next.store(true, Ordering::SeqCst);
        let pipeline = pipeline(chain, repos.clone(), None).await;
        let (_stop, shutdown) = watch::channel(false);

        let result = pipeline.run(shutdown).await;
        assert!(matches!(
            result,
            Err(IndexerError::Storage(StorageError::TransactionError(_)))
        ));

        let state = repos.snapshot();
        assert!(state.blocks.is_empty());
        let cp = repos.checkpoints().get_checkpoint("task").await.unwrap().unwrap();
        assert_eq!(cp.current_height, 0);
        assert_eq!(cp.status, TaskStatus::Unhandled);
    }

    // Une enveloppe illisible n'empêche pas le commit du bloc
    #[tokio::test]
    async fn test_undecodable_envelope_still_commits_block() {
        let chain = Arc::new(FakeChain::with_head(1));
        chain.add_block(1, vec![b"garbage".to_vec()]);
        let repos = Arc::new(MemoryRepositories::default());
        let pipeline = pipeline(chain, repos.clone(), None).await;
        let (stop, shutdown) = watch::channel(false);
        let task = tokio::spawn({
            let pipeline = pipeline.clone();
            async move { pipeline.run(shutdown).await }
        });

        wait_for_height(&repos, 1).await;
        stop.send(true).unwrap();
        task.await.unwrap().unwrap_err();

        let state = repos.snapshot();
        assert_eq!(state.blocks[&1]["tx_count"], 1);
        assert!(state.txs.is_empty());
    }
}
