//! `irismod.coinswap`

use serde::Serialize;

use super::Coin;

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct MsgAddLiquidity {
    #[prost(message, optional, tag = "1")]
    pub max_token: Option<Coin>,
    #[prost(string, tag = "2")]
    pub exact_standard_amt: String,
    #[prost(string, tag = "3")]
    pub min_liquidity: String,
    #[prost(int64, tag = "4")]
    pub deadline: i64,
    #[prost(string, tag = "5")]
    pub sender: String,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct MsgRemoveLiquidity {
    #[prost(message, optional, tag = "1")]
    pub withdraw_liquidity: Option<Coin>,
    #[prost(string, tag = "2")]
    pub min_token: String,
    #[prost(string, tag = "3")]
    pub min_standard_amt: String,
    #[prost(int64, tag = "4")]
    pub deadline: i64,
    #[prost(string, tag = "5")]
    pub sender: String,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct SwapInput {
    #[prost(string, tag = "1")]
    pub address: String,
    #[prost(message, optional, tag = "2")]
    pub coin: Option<Coin>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct SwapOutput {
    #[prost(string, tag = "1")]
    pub address: String,
    #[prost(message, optional, tag = "2")]
    pub coin: Option<Coin>,
}

#[derive(Clone, PartialEq, ::prost::Message, Serialize)]
pub struct MsgSwapOrder {
    #[prost(message, optional, tag = "1")]
    pub input: Option<SwapInput>,
    #[prost(message, optional, tag = "2")]
    pub output: Option<SwapOutput>,
    #[prost(int64, tag = "3")]
    pub deadline: i64,
    #[prost(bool, tag = "4")]
    pub is_buy_order: bool,
}
