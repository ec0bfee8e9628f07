//! Envelope decoding and per-message fan-out.
//!
//! One raw envelope becomes zero or more [`Transaction`] records, one per
//! message with a registered transform. Failures are absorbed here:
//!
//! - an envelope that fails to decode is skipped,
//! - a message without transform, or whose payload fails to decode, is
//!   skipped,
//! - a failed result lookup leaves the records with status `unknown`.

use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use crate::error::DomainError;
use crate::metrics::{record_decode_error, record_unknown_message};
use crate::models::Transaction;
use crate::ports::{ChainProfile, ConnectionManager, Envelope, RawBlock, TransformContext};
use crate::services::correlator::{ExecutionResult, ResultCorrelator};

/// Transaction hash: uppercase hex SHA-256 of the raw envelope.
pub fn tx_hash(raw: &[u8]) -> String {
    hex::encode_upper(Sha256::digest(raw))
}

pub struct TransactionDecoder<M: ConnectionManager> {
    profile: ChainProfile,
    correlator: ResultCorrelator<M>,
}

impl<M: ConnectionManager> TransactionDecoder<M> {
    pub fn new(profile: ChainProfile, correlator: ResultCorrelator<M>) -> Self {
        Self {
            profile,
            correlator,
        }
    }

    /// Decode every envelope of a block, in block order.
    pub async fn decode_block(&self, block: &RawBlock) -> Vec<Transaction> {
        let mut records = Vec::new();
        for raw in &block.txs {
            records.extend(self.decode_envelope(raw, block).await);
        }
        records
    }

    #[instrument(skip_all, fields(height = block.height, tx = tracing::field::Empty))]
    async fn decode_envelope(&self, raw: &[u8], block: &RawBlock) -> Vec<Transaction> {
        let hash = tx_hash(raw);
        tracing::Span::current().record("tx", hash.as_str());

        let envelope = match self.profile.decoder.decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "⚠️  Envelope decode failed, skipping");
                record_decode_error("envelope");
                return Vec::new();
            }
        };

        if envelope.messages.is_empty() {
            debug!("Envelope carries no messages");
            return Vec::new();
        }

        let result = self.correlator.correlate(&hash).await;
        self.fan_out(&hash, envelope, block, &result)
    }

    /// Build one record per recognised message of a decoded envelope.
    pub fn fan_out(
        &self,
        hash: &str,
        envelope: Envelope,
        block: &RawBlock,
        result: &ExecutionResult,
    ) -> Vec<Transaction> {
        let message_statuses = if self.profile.per_message_status {
            result.message_statuses()
        } else {
            Default::default()
        };

        let mut records = Vec::with_capacity(envelope.messages.len());
        for (index, msg) in envelope.messages.iter().enumerate() {
            let msg_index = index as u32;
            let status = message_statuses
                .get(&msg_index)
                .copied()
                .unwrap_or(result.status);
            let ctx = TransformContext {
                status,
                events: &result.events,
                packet_events: &result.packet_events,
            };

            let draft = match self.profile.registry.transform(msg, &ctx) {
                Ok(draft) => draft,
                Err(DomainError::UnknownMessage(type_url)) => {
                    warn!(msg_index, type_url = %type_url, "⚠️  No transform for message, skipping");
                    record_unknown_message(&self.profile.name);
                    continue;
                }
                Err(e) => {
                    warn!(msg_index, type_url = %msg.type_url, error = %e, "⚠️  Message decode failed, skipping");
                    record_decode_error("message");
                    continue;
                }
            };

            let events = if draft.attach_packet_events {
                result.packet_events.clone()
            } else {
                Vec::new()
            };

            records.push(Transaction {
                tx_hash: hash.to_string(),
                msg_index,
                height: block.height,
                time: block.time,
                memo: envelope.memo.clone(),
                fee: envelope.fee.clone(),
                status,
                code: result.code,
                initiator: draft.initiator,
                from: draft.from,
                to: draft.to,
                amount: draft.amount,
                tx_type: draft.tx_type,
                payload: serde_json::json!({
                    "type": draft.tx_type,
                    "msg": draft.msg,
                }),
                events,
                ibc_packet_hash: draft.packet_hash,
            });
        }
        records
    }
}
