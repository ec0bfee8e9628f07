//! Protobuf message definitions for the supported Cosmos-SDK modules.
//!
//! Only the fields the indexer reads or stores are declared; prost skips
//! unknown fields when decoding. Every message also serializes to JSON so
//! it can be stored as the record payload.

pub mod bank;
pub mod coinswap;
pub mod crisis;
pub mod distribution;
pub mod gov;
pub mod ibc;
pub mod slashing;
pub mod staking;
pub mod tx;

use serde::Serialize;
use tidemark_core::models::Coin as DomainCoin;

/// `cosmos.base.v1beta1.Coin`
#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct Coin {
    #[prost(string, tag = "1")]
    pub denom: String,
    #[prost(string, tag = "2")]
    pub amount: String,
}

impl Coin {
    pub fn to_domain(&self) -> DomainCoin {
        DomainCoin::from_parts(&self.denom, &self.amount)
    }
}

/// Convert a list of wire coins.
pub fn domain_coins(coins: &[Coin]) -> Vec<DomainCoin> {
    coins.iter().map(Coin::to_domain).collect()
}

/// Serde helpers for protobuf types without a JSON mapping of their own.
pub(crate) mod json {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use prost_types::Any;
    use serde::Serializer;
    use serde::ser::SerializeStruct;

    /// Bytes as base64, like the protobuf JSON mapping.
    pub fn bytes<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    /// Packed message as `{type_url, value}` with a base64 value.
    pub fn any<S: Serializer>(any: &Option<Any>, serializer: S) -> Result<S::Ok, S::Error> {
        match any {
            None => serializer.serialize_none(),
            Some(any) => {
                let mut state = serializer.serialize_struct("Any", 2)?;
                state.serialize_field("type_url", &any.type_url)?;
                state.serialize_field("value", &STANDARD.encode(&any.value))?;
                state.end()
            }
        }
    }
}
