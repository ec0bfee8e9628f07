//! Protobuf envelope decoding.

use prost::Message;

use tidemark_core::error::{DomainError, DomainResult};
use tidemark_core::ports::{Envelope, EnvelopeDecoder};

use crate::proto::domain_coins;
use crate::proto::tx::{AuthInfo, TxBody, TxRaw};

/// How a `TxRaw` is framed inside a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeScheme {
    /// The bytes are the `TxRaw` message itself.
    Bare,
    /// The `TxRaw` is preceded by its varint-encoded length.
    LengthPrefixed,
}

/// Decodes `cosmos.tx.v1beta1.TxRaw` envelopes.
#[derive(Debug, Clone, Copy)]
pub struct ProtoEnvelopeDecoder {
    scheme: EnvelopeScheme,
}

impl ProtoEnvelopeDecoder {
    pub fn new(scheme: EnvelopeScheme) -> Self {
        Self { scheme }
    }

    pub fn scheme(&self) -> EnvelopeScheme {
        self.scheme
    }

    fn decode_raw(&self, raw: &[u8]) -> Result<TxRaw, prost::DecodeError> {
        match self.scheme {
            EnvelopeScheme::Bare => TxRaw::decode(raw),
            EnvelopeScheme::LengthPrefixed => TxRaw::decode_length_delimited(raw),
        }
    }
}

impl EnvelopeDecoder for ProtoEnvelopeDecoder {
    fn decode(&self, raw: &[u8]) -> DomainResult<Envelope> {
        let tx_raw = self
            .decode_raw(raw)
            .map_err(|e| DomainError::DecodingError(format!("tx raw: {}", e)))?;
        let body = TxBody::decode(tx_raw.body_bytes.as_slice())
            .map_err(|e| DomainError::DecodingError(format!("tx body: {}", e)))?;
        let auth_info = AuthInfo::decode(tx_raw.auth_info_bytes.as_slice())
            .map_err(|e| DomainError::DecodingError(format!("auth info: {}", e)))?;

        let fee = auth_info
            .fee
            .map(|fee| domain_coins(&fee.amount))
            .unwrap_or_default();

        Ok(Envelope {
            memo: body.memo,
            fee,
            messages: body.messages,
        })
    }
}
