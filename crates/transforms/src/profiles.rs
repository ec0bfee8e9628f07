//! Chain profiles: which messages a chain indexes and how its envelopes are
//! framed.

use std::sync::Arc;

use tracing::info;

use tidemark_core::ports::{ChainProfile, TransformRegistry};

use crate::envelope::{EnvelopeScheme, ProtoEnvelopeDecoder};
use crate::{coinswap, cosmos, ibc};

pub const IRIS: &str = "iris";
pub const COSMOS: &str = "cosmos";

/// Names accepted by [`profile_by_name`].
pub const PROFILE_NAMES: &[&str] = &[IRIS, COSMOS];

/// IRIS hub: bank sends, IBC transfers and coin-swap.
pub fn iris_profile() -> ChainProfile {
    let mut registry = TransformRegistry::new();
    cosmos::register_bank_send(&mut registry);
    ibc::register(&mut registry);
    coinswap::register(&mut registry);

    build(IRIS, registry, EnvelopeScheme::Bare, false)
}

/// Cosmos hub: the standard SDK modules, with per-message status.
pub fn cosmos_profile() -> ChainProfile {
    let mut registry = TransformRegistry::new();
    cosmos::register_all(&mut registry);

    build(COSMOS, registry, EnvelopeScheme::LengthPrefixed, true)
}

/// Look up a profile by name (case-insensitive).
pub fn profile_by_name(name: &str) -> Option<ChainProfile> {
    match name.to_ascii_lowercase().as_str() {
        IRIS => Some(iris_profile()),
        COSMOS => Some(cosmos_profile()),
        _ => None,
    }
}

fn build(
    name: &str,
    registry: TransformRegistry,
    scheme: EnvelopeScheme,
    per_message_status: bool,
) -> ChainProfile {
    info!(
        profile = name,
        transforms = registry.len(),
        scheme = ?scheme,
        "📦 Chain profile loaded"
    );
    ChainProfile {
        name: name.to_string(),
        decoder: Arc::new(ProtoEnvelopeDecoder::new(scheme)),
        registry: Arc::new(registry),
        per_message_status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::tests::tx_bytes;
    use crate::proto::Coin;
    use crate::proto::bank::MsgSend;
    use prost::Message;
    use prost_types::Any;

    #[test]
    fn test_iris_types() {
        let profile = iris_profile();
        assert_eq!(
            profile.registry.registered_types(),
            vec![
                cosmos::MSG_SEND,
                ibc::MSG_TRANSFER,
                ibc::MSG_RECV_PACKET,
                ibc::MSG_TIMEOUT,
                coinswap::MSG_ADD_LIQUIDITY,
                coinswap::MSG_REMOVE_LIQUIDITY,
                coinswap::MSG_SWAP_ORDER,
            ]
        );
        assert!(!profile.per_message_status);
    }

    #[test]
    fn test_cosmos_types() {
        let profile = cosmos_profile();
        assert_eq!(profile.registry.len(), 15);
        assert!(!profile.registry.has_transform(ibc::MSG_TRANSFER));
        assert!(!profile.registry.has_transform(coinswap::MSG_SWAP_ORDER));
        assert!(profile.per_message_status);
    }

    #[test]
    fn test_profile_by_name() {
        assert_eq!(profile_by_name("IRIS").map(|p| p.name), Some("iris".to_string()));
        assert_eq!(profile_by_name("cosmos").map(|p| p.name), Some("cosmos".to_string()));
        assert!(profile_by_name("osmosis").is_none());
    }

    // Test critique: chaque profil décode son propre cadrage d'enveloppe
    #[test]
    fn test_profiles_decode_their_framing() {
        let send = MsgSend {
            from_address: "a".into(),
            to_address: "b".into(),
            amount: vec![Coin {
                denom: "uatom".into(),
                amount: "1".into(),
            }],
        };
        let bare = tx_bytes(
            "memo",
            vec![Any {
                type_url: cosmos::MSG_SEND.into(),
                value: send.encode_to_vec(),
            }],
        );
        let mut framed = Vec::new();
        prost::encoding::encode_varint(bare.len() as u64, &mut framed);
        framed.extend_from_slice(&bare);

        let iris = iris_profile().decoder.decode(&bare).unwrap();
        let cosmos = cosmos_profile().decoder.decode(&framed).unwrap();
        assert_eq!(iris, cosmos);
        assert_eq!(iris.memo, "memo");
    }
}
