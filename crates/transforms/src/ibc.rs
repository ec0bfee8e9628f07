//! Cross-chain (IBC) transfer transforms.
//!
//! A sent packet and its receipt on the other chain are linked through a
//! packet hash: the MD5 of a canonical JSON rendering of the packet. The
//! sending side rebuilds the packet from the `send_packet` event, the
//! receiving side from the packet carried by the message, so both must
//! serialize identically.

use serde::Serialize;
use serde_json::Value;

use tidemark_core::error::DomainResult;
use tidemark_core::models::{Coin, Event, TxType};
use tidemark_core::ports::{TransactionDraft, TransformContext, TransformRegistry};

use crate::proto::ibc::{FungibleTokenPacketData, MsgRecvPacket, MsgTimeout, MsgTransfer, Packet};

pub const MSG_TRANSFER: &str = "/ibc.applications.transfer.v1.MsgTransfer";
pub const MSG_RECV_PACKET: &str = "/ibc.core.channel.v1.MsgRecvPacket";
pub const MSG_TIMEOUT: &str = "/ibc.core.channel.v1.MsgTimeout";

// `send_packet` event attributes
const ATTR_DATA: &str = "packet_data";
const ATTR_SEQUENCE: &str = "packet_sequence";
const ATTR_TIMEOUT_HEIGHT: &str = "packet_timeout_height";
const ATTR_SRC_PORT: &str = "packet_src_port";
const ATTR_SRC_CHANNEL: &str = "packet_src_channel";
const ATTR_DST_PORT: &str = "packet_dst_port";
const ATTR_DST_CHANNEL: &str = "packet_dst_channel";

pub fn register(registry: &mut TransformRegistry) {
    registry.register(MSG_TRANSFER, transfer);
    registry.register(MSG_RECV_PACKET, recv_packet);
    registry.register(MSG_TIMEOUT, timeout);
}

// =============================================================================
// Packet hash
// =============================================================================

/// Packet fields in hashing order. Do not reorder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalPacket {
    pub sequence: u64,
    pub timeout_height: u64,
    pub source_port: String,
    pub source_channel: String,
    pub destination_port: String,
    pub destination_channel: String,
    pub data: Value,
}

impl CanonicalPacket {
    /// Rebuild the packet from a `send_packet` event.
    ///
    /// Returns `None` when the event has no packet data.
    pub fn from_send_event(event: &Event) -> Option<Self> {
        let data = event.attribute(ATTR_DATA)?;
        let attr = |key: &str| event.attribute(key).unwrap_or_default().to_string();
        Some(Self {
            sequence: event
                .attribute(ATTR_SEQUENCE)
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            timeout_height: event
                .attribute(ATTR_TIMEOUT_HEIGHT)
                .map(revision_height)
                .unwrap_or_default(),
            source_port: attr(ATTR_SRC_PORT),
            source_channel: attr(ATTR_SRC_CHANNEL),
            destination_port: attr(ATTR_DST_PORT),
            destination_channel: attr(ATTR_DST_CHANNEL),
            data: payload(data.as_bytes()),
        })
    }

    pub fn from_packet(packet: &Packet) -> Self {
        Self {
            sequence: packet.sequence,
            timeout_height: packet
                .timeout_height
                .as_ref()
                .map(|h| h.revision_height)
                .unwrap_or_default(),
            source_port: packet.source_port.clone(),
            source_channel: packet.source_channel.clone(),
            destination_port: packet.destination_port.clone(),
            destination_channel: packet.destination_channel.clone(),
            data: payload(&packet.data),
        }
    }

    /// Lowercase hex MD5 of the canonical JSON.
    pub fn hash(&self) -> String {
        // Serializing plain strings, integers and a Value cannot fail
        let json = serde_json::to_vec(self).unwrap_or_default();
        format!("{:x}", md5::compute(json))
    }
}

/// `"1-12345"` → 12345. A bare number is taken as is.
fn revision_height(value: &str) -> u64 {
    value
        .rsplit('-')
        .next()
        .and_then(|h| h.parse().ok())
        .unwrap_or_default()
}

/// Packet payload as JSON with sorted keys, or as a plain string when it is
/// not JSON.
fn payload(raw: &[u8]) -> Value {
    match serde_json::from_slice::<Value>(raw) {
        Ok(value) => sorted(value),
        Err(_) => Value::String(String::from_utf8_lossy(raw).into_owned()),
    }
}

// Key order must not depend on serde_json's map features
fn sorted(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sorted(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sorted).collect()),
        other => other,
    }
}

// =============================================================================
// Denom traces
// =============================================================================

/// Direction of a transfer relative to the indexed chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outbound,
    Inbound,
}

/// Strip the `port/channel/` trace prefix of a denom.
///
/// Outbound, the prefix goes when it names the destination channel (the
/// token is returning home). Inbound, it goes when it does not. Denoms
/// without a full `port/channel/base` shape are returned unchanged.
pub fn strip_trace_prefix(denom: &str, direction: Direction, port: &str, channel: &str) -> String {
    let mut segments = denom.splitn(3, '/');
    let (Some(p), Some(c), Some(base)) = (segments.next(), segments.next(), segments.next()) else {
        return denom.to_string();
    };

    let is_destination = p == port && c == channel;
    let strip = match direction {
        Direction::Outbound => is_destination,
        Direction::Inbound => !is_destination,
    };
    if strip { base.to_string() } else { denom.to_string() }
}

// =============================================================================
// Transforms
// =============================================================================

fn transfer(msg: MsgTransfer, ctx: &TransformContext<'_>) -> DomainResult<TransactionDraft> {
    let send_event = ctx.packet_events.first();
    let hash = send_event
        .and_then(CanonicalPacket::from_send_event)
        .map(|packet| packet.hash());

    let (dst_port, dst_channel) = send_event
        .map(|e| {
            (
                e.attribute(ATTR_DST_PORT).unwrap_or_default(),
                e.attribute(ATTR_DST_CHANNEL).unwrap_or_default(),
            )
        })
        .unwrap_or_default();

    let amount = msg
        .token
        .iter()
        .map(|token| {
            let mut coin = token.to_domain();
            coin.denom = strip_trace_prefix(&coin.denom, Direction::Outbound, dst_port, dst_channel);
            coin
        })
        .collect();

    Ok(TransactionDraft::new(TxType::IbcTransfer, &msg)?
        .sent_by(msg.sender.as_str())
        .recipient(msg.receiver.as_str())
        .amount(amount)
        .packet(hash))
}

fn recv_packet(msg: MsgRecvPacket, _ctx: &TransformContext<'_>) -> DomainResult<TransactionDraft> {
    let mut draft = TransactionDraft::new(TxType::IbcRecvPacket, &msg)?.initiator(msg.signer.as_str());
    let Some(packet) = msg.packet.as_ref() else {
        return Ok(draft);
    };

    let data: FungibleTokenPacketData = serde_json::from_slice(&packet.data).unwrap_or_default();
    if !data.denom.is_empty() {
        let denom = strip_trace_prefix(
            &data.denom,
            Direction::Inbound,
            &packet.destination_port,
            &packet.destination_channel,
        );
        draft = draft.amount(vec![Coin::from_parts(&denom, &data.amount)]);
    }

    draft.packet_hash = Some(CanonicalPacket::from_packet(packet).hash());
    Ok(draft.sender(data.sender).recipient(data.receiver))
}

fn timeout(msg: MsgTimeout, _ctx: &TransformContext<'_>) -> DomainResult<TransactionDraft> {
    let mut draft = TransactionDraft::new(TxType::IbcTimeout, &msg)?.sent_by(msg.signer.as_str());
    draft.packet_hash = msg
        .packet
        .as_ref()
        .map(|packet| CanonicalPacket::from_packet(packet).hash());
    Ok(draft)
}
