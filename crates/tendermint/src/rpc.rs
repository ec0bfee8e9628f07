//! Tendermint JSON-RPC response shapes and their conversion to core types.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use tracing::warn;

use tidemark_core::error::{ChainError, ChainResult};
use tidemark_core::models::Event;
use tidemark_core::ports::{RawBlock, TxResult};

/// JSON-RPC envelope. Exactly one of `result` and `error` is set.
#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcErrorBody {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl<T> RpcResponse<T> {
    pub fn into_result(self) -> ChainResult<T> {
        match (self.result, self.error) {
            (_, Some(err)) => {
                let detail = match err.data {
                    Some(serde_json::Value::String(s)) => s,
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                Err(ChainError::RpcError(format!(
                    "{} ({}): {}",
                    err.message, err.code, detail
                )))
            }
            (Some(result), None) => Ok(result),
            (None, None) => Err(ChainError::MalformedResponse(
                "response carries neither result nor error".into(),
            )),
        }
    }
}

// =============================================================================
// /status
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct StatusResult {
    pub sync_info: SyncInfo,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SyncInfo {
    #[serde(deserialize_with = "de_u64")]
    pub latest_block_height: u64,
}

// =============================================================================
// /block
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct BlockResult {
    pub block: BlockBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BlockBody {
    pub header: Header,
    pub data: BlockData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Header {
    #[serde(deserialize_with = "de_u64")]
    pub height: u64,
    #[serde(default)]
    pub time: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BlockData {
    /// Base64 envelopes; `null` on empty blocks.
    #[serde(default)]
    pub txs: Option<Vec<String>>,
}

impl BlockResult {
    /// Undecodable base64 entries are kept as their raw text. The envelope
    /// decoder then rejects them like any other malformed tx, so one bad
    /// entry does not stall the height.
    pub fn into_raw_block(self) -> RawBlock {
        let header = self.block.header;
        let txs = self
            .block
            .data
            .txs
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(index, tx)| match STANDARD.decode(&tx) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(
                        height = header.height,
                        index,
                        error = %e,
                        "⚠️  Invalid base64 tx, keeping raw text"
                    );
                    tx.into_bytes()
                }
            })
            .collect();

        let time = header
            .time
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc));

        RawBlock {
            height: header.height,
            time,
            txs,
        }
    }
}

// =============================================================================
// /tx
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct TxResponse {
    pub tx_result: TxResultBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TxResultBody {
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub events: Vec<RpcEvent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<RpcAttribute>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcAttribute {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

impl TxResponse {
    /// Convert to the core result, decoding base64 attributes when asked to.
    pub fn into_tx_result(self, base64_attributes: bool) -> TxResult {
        let decode = |s: Option<String>| {
            let s = s.unwrap_or_default();
            if !base64_attributes {
                return s;
            }
            match STANDARD.decode(&s) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(_) => s,
            }
        };

        let events = self
            .tx_result
            .events
            .into_iter()
            .map(|event| {
                let mut converted = Event::new(event.kind);
                for attr in event.attributes {
                    converted
                        .attributes
                        .insert(decode(attr.key), decode(attr.value));
                }
                converted
            })
            .collect();

        TxResult {
            code: self.tx_result.code,
            log: self.tx_result.log,
            events,
        }
    }
}

/// Heights come as strings from Tendermint, as numbers from some proxies.
fn de_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StrOrNum {
        Str(String),
        Num(u64),
    }

    match StrOrNum::deserialize(deserializer)? {
        StrOrNum::Num(n) => Ok(n),
        StrOrNum::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}
