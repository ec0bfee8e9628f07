//! IRIS coin-swap transforms (liquidity pools and swap orders).

use std::str::FromStr;

use bigdecimal::BigDecimal;
use tracing::debug;

use tidemark_core::error::DomainResult;
use tidemark_core::models::{Coin, Event, TxStatus, TxType};
use tidemark_core::ports::{TransactionDraft, TransformContext, TransformRegistry};

use crate::proto::coinswap::{MsgAddLiquidity, MsgRemoveLiquidity, MsgSwapOrder};

pub const MSG_ADD_LIQUIDITY: &str = "/irismod.coinswap.MsgAddLiquidity";
pub const MSG_REMOVE_LIQUIDITY: &str = "/irismod.coinswap.MsgRemoveLiquidity";
pub const MSG_SWAP_ORDER: &str = "/irismod.coinswap.MsgSwapOrder";

const TRANSFER_EVENT: &str = "transfer";
const AMOUNT_ATTR: &str = "amount";

pub fn register(registry: &mut TransformRegistry) {
    registry.register(MSG_ADD_LIQUIDITY, add_liquidity);
    registry.register(MSG_REMOVE_LIQUIDITY, remove_liquidity);
    registry.register(MSG_SWAP_ORDER, swap_order);
}

fn add_liquidity(msg: MsgAddLiquidity, _ctx: &TransformContext<'_>) -> DomainResult<TransactionDraft> {
    Ok(TransactionDraft::new(TxType::AddLiquidity, &msg)?
        .sent_by(msg.sender.as_str())
        .amount(msg.max_token.iter().map(|c| c.to_domain()).collect()))
}

fn remove_liquidity(
    msg: MsgRemoveLiquidity,
    _ctx: &TransformContext<'_>,
) -> DomainResult<TransactionDraft> {
    Ok(TransactionDraft::new(TxType::RemoveLiquidity, &msg)?
        .sent_by(msg.sender.as_str())
        .amount(msg.withdraw_liquidity.iter().map(|c| c.to_domain()).collect()))
}

fn swap_order(msg: MsgSwapOrder, ctx: &TransformContext<'_>) -> DomainResult<TransactionDraft> {
    let input = msg.input.clone().unwrap_or_default();
    let output = msg.output.clone().unwrap_or_default();
    let input_coin = input.coin.map(|c| c.to_domain()).unwrap_or_default();
    let declared_output = output.coin.map(|c| c.to_domain()).unwrap_or_default();

    Ok(TransactionDraft::new(TxType::Swap, &msg)?
        .sent_by(input.address)
        .recipient(output.address)
        .amount(settlement(input_coin, declared_output, ctx)))
}

/// Coins moved by a swap order: `[input, output]`.
///
/// A failed order records the declared output. A successful one records what
/// the first matching `transfer` event actually paid out, or the input alone
/// when no event reports it.
pub fn settlement(input: Coin, declared_output: Coin, ctx: &TransformContext<'_>) -> Vec<Coin> {
    if ctx.status != TxStatus::Success {
        return vec![input, declared_output];
    }

    match settled_output(ctx.events, &declared_output.denom) {
        Some(output) => vec![input, output],
        None => {
            debug!(denom = %declared_output.denom, "No transfer event settles swap output");
            vec![input]
        }
    }
}

fn settled_output(events: &[Event], denom: &str) -> Option<Coin> {
    if denom.is_empty() {
        return None;
    }
    events
        .iter()
        .filter(|e| e.kind == TRANSFER_EVENT)
        .filter_map(|e| e.attribute(AMOUNT_ATTR))
        .find_map(|amounts| {
            amounts.split(',').find_map(|coin| {
                let coin = coin.trim();
                let index = coin.find(denom).filter(|&i| i > 0)?;
                if index + denom.len() != coin.len() {
                    return None;
                }
                let amount = BigDecimal::from_str(&coin[..index]).ok()?;
                Some(Coin::new(denom, amount))
            })
        })
}
