//! Domain models representing indexed ledger data.
//!
//! These models are storage-agnostic and represent the canonical
//! form of indexed data within the domain layer. They serialize to the
//! documents persisted by the storage adapter.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

// =============================================================================
// Coins
// =============================================================================

/// An amount of a single denomination.
///
/// The denom may carry a cross-chain trace prefix (`port/channel/base`).
/// Amounts are arbitrary precision: SDK integers go well past 2^96 on
/// 18-decimal denoms. They serialize as strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: BigDecimal,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: BigDecimal) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    /// Build a coin from the string amount carried by protobuf messages.
    ///
    /// Unparseable amounts become zero; the node already validated them.
    pub fn from_parts(denom: &str, amount: &str) -> Self {
        let parsed = BigDecimal::from_str(amount).unwrap_or_else(|_| {
            warn!(denom, amount, "⚠️ Unparseable coin amount, recording zero");
            BigDecimal::default()
        });
        Self::new(denom, parsed)
    }

    /// Parse the compact `<amount><denom>` notation used in event attributes
    /// (e.g. `100uatom`, `2.5ibc/27394FB0`).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .filter(|&i| i > 0)?;
        let (amount, denom) = s.split_at(split);
        let amount = BigDecimal::from_str(amount).ok()?;
        Some(Self::new(denom, amount))
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

// =============================================================================
// Events
// =============================================================================

/// Execution event reported by the node for a transaction.
///
/// Duplicate attribute keys collapse, the last value wins.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: BTreeMap<String, String>,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute insertion.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

// =============================================================================
// Blocks
// =============================================================================

/// Indexed block. One per height, immutable once committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Block height (always > 0).
    pub height: u64,
    /// Header time reported by the node.
    pub time: Option<DateTime<Utc>>,
    /// Number of raw envelopes in the block.
    pub tx_count: u32,
    /// When this block was indexed.
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Transactions
// =============================================================================

/// Execution status of a transaction or of one of its messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Success,
    Fail,
    /// The execution result could not be retrieved.
    Unknown,
}

impl TxStatus {
    /// Status derived from a result code: zero is success.
    pub fn from_code(code: u32) -> Self {
        if code == 0 { Self::Success } else { Self::Fail }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Fail => "fail",
            Self::Unknown => "unknown",
        }
    }
}

/// Canonical transaction type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    Transfer,
    Multisend,
    Delegate,
    Unbond,
    BeginRedelegate,
    CreateValidator,
    EditValidator,
    SetWithdrawAddress,
    WithdrawDelegatorReward,
    WithdrawValidatorCommission,
    SubmitProposal,
    Deposit,
    Vote,
    Unjail,
    VerifyInvariant,
    IbcTransfer,
    IbcRecvPacket,
    IbcTimeout,
    AddLiquidity,
    RemoveLiquidity,
    Swap,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::Multisend => "multisend",
            Self::Delegate => "delegate",
            Self::Unbond => "unbond",
            Self::BeginRedelegate => "begin_redelegate",
            Self::CreateValidator => "create_validator",
            Self::EditValidator => "edit_validator",
            Self::SetWithdrawAddress => "set_withdraw_address",
            Self::WithdrawDelegatorReward => "withdraw_delegator_reward",
            Self::WithdrawValidatorCommission => "withdraw_validator_commission",
            Self::SubmitProposal => "submit_proposal",
            Self::Deposit => "deposit",
            Self::Vote => "vote",
            Self::Unjail => "unjail",
            Self::VerifyInvariant => "verify_invariant",
            Self::IbcTransfer => "ibc_transfer",
            Self::IbcRecvPacket => "ibc_recv_packet",
            Self::IbcTimeout => "ibc_timeout",
            Self::AddLiquidity => "add_liquidity",
            Self::RemoveLiquidity => "remove_liquidity",
            Self::Swap => "swap",
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Indexed transaction record.
///
/// One record per recognised message of an envelope. Envelope-level fields
/// (hash, memo, fee, status) are shared between the records of one envelope;
/// `(tx_hash, msg_index)` identifies a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Uppercase hex SHA-256 of the raw envelope.
    pub tx_hash: String,
    /// Position of the message inside the envelope.
    pub msg_index: u32,
    pub height: u64,
    pub time: Option<DateTime<Utc>>,
    pub memo: String,
    pub fee: Vec<Coin>,
    pub status: TxStatus,
    /// Execution result code (0 when unknown).
    pub code: u32,
    pub initiator: String,
    pub from: String,
    pub to: String,
    pub amount: Vec<Coin>,
    #[serde(rename = "type")]
    pub tx_type: TxType,
    /// `{"type": <tag>, "msg": <decoded message>}`.
    pub payload: serde_json::Value,
    /// Packet events, only for types that derive a packet hash.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Event>,
    /// MD5 of the canonical cross-chain packet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ibc_packet_hash: Option<String>,
}

// =============================================================================
// Sync Task State
// =============================================================================

/// Lifecycle status of a sync task checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created at bootstrap, nothing committed yet.
    Unhandled,
    /// At least one height committed.
    Underway,
}

/// Progress checkpoint of a sync task.
///
/// `current_height` is the highest committed height. The checkpoint is
/// created once at bootstrap and only ever updated inside a block commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub current_height: u64,
    pub status: TaskStatus,
    pub last_update_time: DateTime<Utc>,
}

impl Checkpoint {
    /// Fresh checkpoint for a task that has not committed anything.
    pub fn bootstrap(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            current_height: 0,
            status: TaskStatus::Unhandled,
            last_update_time: Utc::now(),
        }
    }

    /// Checkpoint state after committing `height`.
    pub fn advanced_to(&self, height: u64) -> Self {
        Self {
            id: self.id.clone(),
            current_height: height,
            status: TaskStatus::Underway,
            last_update_time: Utc::now(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coin_parse_compact_notation() {
        let coin = Coin::parse("100uatom").unwrap();
        assert_eq!(coin.denom, "uatom");
        assert_eq!(coin.amount, BigDecimal::from(100));

        let coin = Coin::parse("2.5ibc/27394FB0").unwrap();
        assert_eq!(coin.denom, "ibc/27394FB0");
        assert_eq!(coin.amount, BigDecimal::from_str("2.5").unwrap());
    }

    #[test]
    fn coin_parse_rejects_missing_parts() {
        assert!(Coin::parse("uatom").is_none());
        assert!(Coin::parse("100").is_none());
        assert!(Coin::parse("").is_none());
    }

    #[test]
    fn coin_from_parts_defaults_to_zero() {
        assert_eq!(Coin::from_parts("uiris", "abc").amount, BigDecimal::default());
        assert_eq!(Coin::from_parts("uiris", "42").amount, BigDecimal::from(42));
    }

    // Test critique: 30 chiffres dépassent 96 bits, le montant doit rester exact
    #[test]
    fn coin_from_parts_keeps_large_amounts() {
        let coin = Coin::from_parts("aevmos", "100000000000000000000000000000");
        assert_ne!(coin.amount, BigDecimal::default());
        assert_eq!(coin.to_string(), "100000000000000000000000000000aevmos");

        let doc = serde_json::to_value(&coin).unwrap();
        assert_eq!(doc["amount"], "100000000000000000000000000000");
        let back: Coin = serde_json::from_value(doc).unwrap();
        assert_eq!(back, coin);
    }

    #[test]
    fn coin_parse_large_amount() {
        let coin = Coin::parse("123456789012345678901234567890aevmos").unwrap();
        assert_eq!(coin.amount, BigDecimal::from_str("123456789012345678901234567890").unwrap());
    }

    // Les tags sérialisés doivent correspondre à as_str
    #[test]
    fn tx_type_serializes_as_tag() {
        for ty in [TxType::Transfer, TxType::IbcRecvPacket, TxType::WithdrawValidatorCommission] {
            let json = serde_json::to_value(ty).unwrap();
            assert_eq!(json, serde_json::Value::String(ty.as_str().to_string()));
        }
    }

    #[test]
    fn status_from_code() {
        assert_eq!(TxStatus::from_code(0), TxStatus::Success);
        assert_eq!(TxStatus::from_code(5), TxStatus::Fail);
    }

    #[test]
    fn checkpoint_advance_marks_underway() {
        let cp = Checkpoint::bootstrap("iris");
        assert_eq!(cp.status, TaskStatus::Unhandled);
        let next = cp.advanced_to(7);
        assert_eq!(next.current_height, 7);
        assert_eq!(next.status, TaskStatus::Underway);
        assert_eq!(next.id, "iris");
    }

    #[test]
    fn transaction_document_omits_empty_optionals() {
        let tx = Transaction {
            tx_hash: "AB".into(),
            msg_index: 0,
            height: 1,
            time: None,
            memo: String::new(),
            fee: vec![],
            status: TxStatus::Success,
            code: 0,
            initiator: "a".into(),
            from: "a".into(),
            to: "b".into(),
            amount: vec![],
            tx_type: TxType::Transfer,
            payload: serde_json::json!({}),
            events: vec![],
            ibc_packet_hash: None,
        };
        let doc = serde_json::to_value(&tx).unwrap();
        assert_eq!(doc["type"], "transfer");
        assert!(doc.get("events").is_none());
        assert!(doc.get("ibc_packet_hash").is_none());
    }
}
