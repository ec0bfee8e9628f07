//! `cosmos.gov.v1beta1`

use prost_types::Any;
use serde::Serialize;

use super::{Coin, json};

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct MsgSubmitProposal {
    #[prost(message, optional, tag = "1")]
    #[serde(serialize_with = "json::any")]
    pub content: Option<Any>,
    #[prost(message, repeated, tag = "2")]
    pub initial_deposit: Vec<Coin>,
    #[prost(string, tag = "3")]
    pub proposer: String,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct MsgDeposit {
    #[prost(uint64, tag = "1")]
    pub proposal_id: u64,
    #[prost(string, tag = "2")]
    pub depositor: String,
    #[prost(message, repeated, tag = "3")]
    pub amount: Vec<Coin>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct MsgVote {
    #[prost(uint64, tag = "1")]
    pub proposal_id: u64,
    #[prost(string, tag = "2")]
    pub voter: String,
    /// `VoteOption` enum value (1 yes, 2 abstain, 3 no, 4 no with veto).
    #[prost(int32, tag = "3")]
    pub option: i32,
}
