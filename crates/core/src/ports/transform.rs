//! Port traits for envelope decoding and message transforms.
//!
//! This is the main extensibility point of the indexer. Each supported
//! message type registers a pure transform keyed by its protobuf type URL;
//! a chain profile bundles a registry with the envelope decoding scheme.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use prost_types::Any;
use serde::Serialize;

use crate::error::{DomainError, DomainResult};
use crate::models::{Coin, Event, TxStatus, TxType};

// =============================================================================
// Envelopes
// =============================================================================

/// A decoded transaction envelope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    pub memo: String,
    pub fee: Vec<Coin>,
    /// Messages in envelope order, still packed.
    pub messages: Vec<Any>,
}

/// Decodes raw envelope bytes according to a chain's wire scheme.
pub trait EnvelopeDecoder: Send + Sync {
    fn decode(&self, raw: &[u8]) -> DomainResult<Envelope>;
}

// =============================================================================
// Transforms
// =============================================================================

/// Execution context visible to a transform.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    /// Envelope-level execution status.
    pub status: TxStatus,
    /// Every event emitted by the transaction.
    pub events: &'a [Event],
    /// Only the `send_packet` events.
    pub packet_events: &'a [Event],
}

/// Message-specific part of a transaction record.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionDraft {
    pub tx_type: TxType,
    pub initiator: String,
    pub from: String,
    pub to: String,
    pub amount: Vec<Coin>,
    /// The decoded message as JSON.
    pub msg: serde_json::Value,
    /// Attach the packet events to the record.
    pub attach_packet_events: bool,
    pub packet_hash: Option<String>,
}

impl TransactionDraft {
    pub fn new<M: Serialize>(tx_type: TxType, msg: &M) -> DomainResult<Self> {
        let msg = serde_json::to_value(msg).map_err(|e| {
            DomainError::DecodingError(format!("failed to serialize {} message: {}", tx_type, e))
        })?;
        Ok(Self {
            tx_type,
            initiator: String::new(),
            from: String::new(),
            to: String::new(),
            amount: Vec::new(),
            msg,
            attach_packet_events: false,
            packet_hash: None,
        })
    }

    /// Set initiator and sender to the same address.
    pub fn sent_by(mut self, sender: impl Into<String>) -> Self {
        let sender = sender.into();
        self.initiator = sender.clone();
        self.from = sender;
        self
    }

    pub fn initiator(mut self, initiator: impl Into<String>) -> Self {
        self.initiator = initiator.into();
        self
    }

    pub fn sender(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    pub fn recipient(mut self, to: impl Into<String>) -> Self {
        self.to = to.into();
        self
    }

    pub fn amount(mut self, amount: Vec<Coin>) -> Self {
        self.amount = amount;
        self
    }

    /// Mark the record as a cross-chain packet record.
    pub fn packet(mut self, hash: Option<String>) -> Self {
        self.attach_packet_events = true;
        self.packet_hash = hash;
        self
    }
}

/// A transform from one packed message to a draft record.
pub trait MessageTransform: Send + Sync {
    fn transform(&self, msg: &Any, ctx: &TransformContext<'_>) -> DomainResult<TransactionDraft>;
}

/// Adapter decoding the packed payload into `M` before calling `f`.
struct TypedTransform<M, F> {
    f: F,
    _msg: PhantomData<fn() -> M>,
}

impl<M, F> MessageTransform for TypedTransform<M, F>
where
    M: prost::Message + Default,
    F: Fn(M, &TransformContext<'_>) -> DomainResult<TransactionDraft> + Send + Sync,
{
    fn transform(&self, msg: &Any, ctx: &TransformContext<'_>) -> DomainResult<TransactionDraft> {
        let decoded = M::decode(msg.value.as_slice())
            .map_err(|e| DomainError::DecodingError(format!("{}: {}", msg.type_url, e)))?;
        (self.f)(decoded, ctx)
    }
}

/// Registry of message transforms keyed by type URL.
pub struct TransformRegistry {
    transforms: HashMap<String, Arc<dyn MessageTransform>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self {
            transforms: HashMap::new(),
        }
    }

    /// Register a raw transform for a type URL. Replaces any previous entry.
    pub fn register_raw(&mut self, type_url: impl Into<String>, transform: Arc<dyn MessageTransform>) {
        self.transforms.insert(type_url.into(), transform);
    }

    /// Register a transform over a decoded protobuf message.
    pub fn register<M, F>(&mut self, type_url: impl Into<String>, f: F)
    where
        M: prost::Message + Default + 'static,
        F: Fn(M, &TransformContext<'_>) -> DomainResult<TransactionDraft> + Send + Sync + 'static,
    {
        self.register_raw(
            type_url,
            Arc::new(TypedTransform {
                f,
                _msg: PhantomData,
            }),
        );
    }

    /// Get the transform for a type URL.
    pub fn get(&self, type_url: &str) -> Option<&Arc<dyn MessageTransform>> {
        self.transforms.get(type_url)
    }

    /// Look up and run the transform for a packed message.
    pub fn transform(&self, msg: &Any, ctx: &TransformContext<'_>) -> DomainResult<TransactionDraft> {
        let transform = self
            .get(&msg.type_url)
            .ok_or_else(|| DomainError::UnknownMessage(msg.type_url.clone()))?;
        transform.transform(msg, ctx)
    }

    pub fn has_transform(&self, type_url: &str) -> bool {
        self.transforms.contains_key(type_url)
    }

    /// All registered type URLs, sorted.
    pub fn registered_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.transforms.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Chain Profiles
// =============================================================================

/// Per-chain parameterization of the pipeline.
#[derive(Clone)]
pub struct ChainProfile {
    pub name: String,
    pub decoder: Arc<dyn EnvelopeDecoder>,
    pub registry: Arc<TransformRegistry>,
    /// Override each record's status from the per-message entries of the
    /// raw log.
    pub per_message_status: bool,
}

impl fmt::Debug for ChainProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainProfile")
            .field("name", &self.name)
            .field("transforms", &self.registry.len())
            .field("per_message_status", &self.per_message_status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, ::prost::Message, serde::Serialize)]
    struct Ping {
        #[prost(string, tag = "1")]
        from: String,
    }

    fn ctx() -> TransformContext<'static> {
        TransformContext {
            status: TxStatus::Success,
            events: &[],
            packet_events: &[],
        }
    }

    fn ping_registry() -> TransformRegistry {
        let mut registry = TransformRegistry::new();
        registry.register("/test.Ping", |msg: Ping, _ctx: &TransformContext<'_>| {
            Ok(TransactionDraft::new(TxType::Transfer, &msg)?.sent_by(msg.from.clone()))
        });
        registry
    }

    // Test critique: le payload est décodé avant d'appeler la transformation
    #[test]
    fn test_typed_transform_decodes_payload() {
        let registry = ping_registry();
        let any = Any {
            type_url: "/test.Ping".into(),
            value: prost::Message::encode_to_vec(&Ping { from: "iaa1x".into() }),
        };

        let draft = registry.transform(&any, &ctx()).unwrap();
        assert_eq!(draft.initiator, "iaa1x");
        assert_eq!(draft.from, "iaa1x");
        assert_eq!(draft.msg["from"], "iaa1x");
    }

    // Test critique: un type inconnu produit UnknownMessage
    #[test]
    fn test_unknown_type_is_reported() {
        let registry = ping_registry();
        let any = Any {
            type_url: "/test.Pong".into(),
            value: vec![],
        };
        let err = registry.transform(&any, &ctx()).unwrap_err();
        assert!(matches!(err, DomainError::UnknownMessage(t) if t == "/test.Pong"));
    }

    // Un payload corrompu produit une erreur de décodage
    #[test]
    fn test_corrupt_payload_is_decoding_error() {
        let registry = ping_registry();
        let any = Any {
            type_url: "/test.Ping".into(),
            value: vec![0x0a, 0xff],
        };
        let err = registry.transform(&any, &ctx()).unwrap_err();
        assert!(matches!(err, DomainError::DecodingError(_)));
    }

    #[test]
    fn test_registered_types_sorted() {
        let mut registry = ping_registry();
        registry.register("/a.First", |msg: Ping, _ctx: &TransformContext<'_>| {
            TransactionDraft::new(TxType::Transfer, &msg)
        });
        assert_eq!(registry.registered_types(), vec!["/a.First", "/test.Ping"]);
        assert!(registry.has_transform("/a.First"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_packet_marks_event_attachment() {
        let draft = TransactionDraft::new(TxType::IbcTransfer, &serde_json::json!({}))
            .unwrap()
            .packet(None);
        assert!(draft.attach_packet_events);
        assert!(draft.packet_hash.is_none());
    }
}
