//! `cosmos.crisis.v1beta1`

use serde::Serialize;

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct MsgVerifyInvariant {
    #[prost(string, tag = "1")]
    pub sender: String,
    #[prost(string, tag = "2")]
    pub invariant_module_name: String,
    #[prost(string, tag = "3")]
    pub invariant_route: String,
}
