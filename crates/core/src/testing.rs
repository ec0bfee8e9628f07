//! In-memory fakes of the ports, shared by the service tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use prost_types::Any;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ChainError, ChainResult, DomainError, DomainResult, StorageError, StorageResult};
use crate::models::{Checkpoint, Coin, TxType};
use crate::ports::{
    ChainProfile, CheckpointRepository, Collection, ConnectionManager, Envelope, EnvelopeDecoder,
    NodeConnector, RawBlock, Repositories, TransactionDraft, TransformContext, TransformRegistry,
    TxResult, WriteOp,
};

// =============================================================================
// Node
// =============================================================================

#[derive(Default)]
pub struct FakeChain {
    pub head: AtomicU64,
    pub blocks: Mutex<HashMap<u64, RawBlock>>,
    pub results: Mutex<HashMap<String, TxResult>>,
    /// Upcoming `fetch_block` calls that fail.
    pub block_failures: AtomicU32,
    /// Upcoming `chain_head_height` calls that fail.
    pub head_failures: AtomicU32,
    pub block_calls: AtomicU32,
    pub head_calls: AtomicU32,
}

impl FakeChain {
    pub fn with_head(head: u64) -> Self {
        let chain = Self::default();
        chain.head.store(head, Ordering::SeqCst);
        chain
    }

    pub fn add_block(&self, height: u64, txs: Vec<Vec<u8>>) {
        self.blocks.lock().insert(
            height,
            RawBlock {
                height,
                time: None,
                txs,
            },
        );
    }

    pub fn add_result(&self, hash: &str, result: TxResult) {
        self.results.lock().insert(hash.to_string(), result);
    }
}

fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

pub struct FakeConnection {
    chain: Arc<FakeChain>,
}

#[async_trait]
impl NodeConnector for FakeConnection {
    async fn fetch_block(&self, height: u64) -> ChainResult<RawBlock> {
        self.chain.block_calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.chain.block_failures) {
            return Err(ChainError::RpcError("connection reset".into()));
        }
        self.chain
            .blocks
            .lock()
            .get(&height)
            .cloned()
            .ok_or_else(|| ChainError::BlockFetchError {
                height,
                message: "not found".into(),
            })
    }

    async fn fetch_tx_result(&self, hash: &str) -> ChainResult<TxResult> {
        self.chain
            .results
            .lock()
            .get(hash)
            .cloned()
            .ok_or_else(|| ChainError::RpcError(format!("tx {} not found", hash)))
    }

    async fn chain_head_height(&self) -> ChainResult<u64> {
        self.chain.head_calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.chain.head_failures) {
            return Err(ChainError::RpcError("status unavailable".into()));
        }
        Ok(self.chain.head.load(Ordering::SeqCst))
    }
}

pub struct FakeManager {
    chain: Arc<FakeChain>,
    pub opened: Arc<AtomicUsize>,
}

impl FakeManager {
    pub fn new(chain: Arc<FakeChain>) -> Self {
        Self {
            chain,
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl ConnectionManager for FakeManager {
    type Connection = FakeConnection;

    async fn connect(&self) -> ChainResult<FakeConnection> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(FakeConnection {
            chain: self.chain.clone(),
        })
    }
}

// =============================================================================
// Store
// =============================================================================

#[derive(Debug, Default, Clone)]
pub struct MemoryState {
    pub blocks: BTreeMap<u64, Value>,
    pub txs: Vec<Value>,
    pub tasks: HashMap<String, Value>,
}

/// Document store applying batches all-or-nothing.
#[derive(Default)]
pub struct MemoryRepositories {
    pub state: Mutex<MemoryState>,
    /// Fail the next batch with an I/O style error.
    pub fail_next: AtomicBool,
    pub batches: AtomicU32,
}

impl MemoryRepositories {
    pub fn snapshot(&self) -> MemoryState {
        self.state.lock().clone()
    }

    fn apply(state: &mut MemoryState, op: &WriteOp) -> StorageResult<()> {
        match op {
            WriteOp::Insert {
                collection: Collection::Blocks,
                document,
            } => {
                let height = document["height"]
                    .as_u64()
                    .ok_or_else(|| StorageError::SerializationError("block without height".into()))?;
                if state.blocks.contains_key(&height) {
                    return Err(StorageError::ConstraintViolation(format!(
                        "duplicate block height {}",
                        height
                    )));
                }
                state.blocks.insert(height, document.clone());
            }
            WriteOp::Insert {
                collection: Collection::Transactions,
                document,
            } => state.txs.push(document.clone()),
            WriteOp::Insert {
                collection: Collection::SyncTasks,
                document,
            } => {
                let id = document["id"].as_str().unwrap_or_default().to_string();
                state.tasks.insert(id, document.clone());
            }
            WriteOp::Update {
                collection,
                id,
                assert_exists,
                patch,
            } => match state.tasks.get_mut(id) {
                Some(Value::Object(doc)) => {
                    for (k, v) in patch {
                        doc.insert(k.clone(), v.clone());
                    }
                }
                _ if *assert_exists => {
                    return Err(StorageError::AssertionFailed {
                        collection: collection.to_string(),
                        id: id.clone(),
                    });
                }
                _ => {}
            },
        }
        Ok(())
    }
}

#[async_trait]
impl CheckpointRepository for MemoryRepositories {
    async fn get_checkpoint(&self, task_id: &str) -> StorageResult<Option<Checkpoint>> {
        self.state
            .lock()
            .tasks
            .get(task_id)
            .map(|doc| {
                serde_json::from_value(doc.clone())
                    .map_err(|e| StorageError::SerializationError(e.to_string()))
            })
            .transpose()
    }

    async fn create_checkpoint(&self, checkpoint: &Checkpoint) -> StorageResult<bool> {
        let mut state = self.state.lock();
        if state.tasks.contains_key(&checkpoint.id) {
            return Ok(false);
        }
        let doc = serde_json::to_value(checkpoint)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        state.tasks.insert(checkpoint.id.clone(), doc);
        Ok(true)
    }
}

#[async_trait]
impl Repositories for MemoryRepositories {
    fn checkpoints(&self) -> &dyn CheckpointRepository {
        self
    }

    async fn run_atomic(&self, ops: &[WriteOp]) -> StorageResult<()> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StorageError::TransactionError("connection lost".into()));
        }
        let mut state = self.state.lock();
        let mut staged = state.clone();
        for op in ops {
            Self::apply(&mut staged, op)?;
        }
        *state = staged;
        Ok(())
    }
}

// =============================================================================
// Envelopes & Transforms
// =============================================================================

pub const SEND_TYPE_URL: &str = "/test.MsgSend";

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct TestSend {
    #[prost(string, tag = "1")]
    pub from: String,
    #[prost(string, tag = "2")]
    pub to: String,
    #[prost(string, tag = "3")]
    pub amount: String,
}

#[derive(Serialize, Deserialize)]
struct TestEnvelope {
    memo: String,
    messages: Vec<(String, Vec<u8>)>,
}

/// Envelopes are JSON in tests; anything else fails to decode.
pub struct JsonEnvelopeDecoder;

impl EnvelopeDecoder for JsonEnvelopeDecoder {
    fn decode(&self, raw: &[u8]) -> DomainResult<Envelope> {
        let env: TestEnvelope =
            serde_json::from_slice(raw).map_err(|e| DomainError::DecodingError(e.to_string()))?;
        Ok(Envelope {
            memo: env.memo,
            fee: vec![Coin::from_parts("utest", "5")],
            messages: env
                .messages
                .into_iter()
                .map(|(type_url, value)| Any { type_url, value })
                .collect(),
        })
    }
}

pub fn send_msg(from: &str, to: &str, amount: &str) -> Any {
    Any {
        type_url: SEND_TYPE_URL.into(),
        value: prost::Message::encode_to_vec(&TestSend {
            from: from.into(),
            to: to.into(),
            amount: amount.into(),
        }),
    }
}

pub fn envelope_bytes(memo: &str, messages: &[Any]) -> Vec<u8> {
    serde_json::to_vec(&TestEnvelope {
        memo: memo.into(),
        messages: messages
            .iter()
            .map(|m| (m.type_url.clone(), m.value.clone()))
            .collect(),
    })
    .unwrap_or_default()
}

pub fn test_profile(per_message_status: bool) -> ChainProfile {
    let mut registry = TransformRegistry::new();
    registry.register(SEND_TYPE_URL, |msg: TestSend, _ctx: &TransformContext<'_>| {
        Ok(TransactionDraft::new(TxType::Transfer, &msg)?
            .sent_by(msg.from.clone())
            .recipient(msg.to.clone())
            .amount(vec![Coin::from_parts("utest", &msg.amount)]))
    });
    ChainProfile {
        name: "test".into(),
        decoder: Arc::new(JsonEnvelopeDecoder),
        registry: Arc::new(registry),
        per_message_status,
    }
}

/// Uppercase hex SHA-256, the way transaction hashes are derived.
pub fn hash_of(raw: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex::encode_upper(Sha256::digest(raw))
}
