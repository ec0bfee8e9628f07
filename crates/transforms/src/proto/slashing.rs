//! `cosmos.slashing.v1beta1`

use serde::Serialize;

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct MsgUnjail {
    #[prost(string, tag = "1")]
    pub validator_addr: String,
}
