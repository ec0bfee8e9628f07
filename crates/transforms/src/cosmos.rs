//! Transforms for the standard Cosmos-SDK modules.

use tidemark_core::error::DomainResult;
use tidemark_core::models::TxType;
use tidemark_core::ports::{TransactionDraft, TransformContext, TransformRegistry};

use crate::proto::bank::{MsgMultiSend, MsgSend};
use crate::proto::crisis::MsgVerifyInvariant;
use crate::proto::distribution::{
    MsgSetWithdrawAddress, MsgWithdrawDelegatorReward, MsgWithdrawValidatorCommission,
};
use crate::proto::gov::{MsgDeposit, MsgSubmitProposal, MsgVote};
use crate::proto::slashing::MsgUnjail;
use crate::proto::staking::{
    MsgBeginRedelegate, MsgCreateValidator, MsgDelegate, MsgEditValidator, MsgUndelegate,
};
use crate::proto::{Coin, domain_coins};

pub const MSG_SEND: &str = "/cosmos.bank.v1beta1.MsgSend";
pub const MSG_MULTI_SEND: &str = "/cosmos.bank.v1beta1.MsgMultiSend";
pub const MSG_DELEGATE: &str = "/cosmos.staking.v1beta1.MsgDelegate";
pub const MSG_UNDELEGATE: &str = "/cosmos.staking.v1beta1.MsgUndelegate";
pub const MSG_BEGIN_REDELEGATE: &str = "/cosmos.staking.v1beta1.MsgBeginRedelegate";
pub const MSG_CREATE_VALIDATOR: &str = "/cosmos.staking.v1beta1.MsgCreateValidator";
pub const MSG_EDIT_VALIDATOR: &str = "/cosmos.staking.v1beta1.MsgEditValidator";
pub const MSG_SET_WITHDRAW_ADDRESS: &str = "/cosmos.distribution.v1beta1.MsgSetWithdrawAddress";
pub const MSG_WITHDRAW_DELEGATOR_REWARD: &str =
    "/cosmos.distribution.v1beta1.MsgWithdrawDelegatorReward";
pub const MSG_WITHDRAW_VALIDATOR_COMMISSION: &str =
    "/cosmos.distribution.v1beta1.MsgWithdrawValidatorCommission";
pub const MSG_SUBMIT_PROPOSAL: &str = "/cosmos.gov.v1beta1.MsgSubmitProposal";
pub const MSG_DEPOSIT: &str = "/cosmos.gov.v1beta1.MsgDeposit";
pub const MSG_VOTE: &str = "/cosmos.gov.v1beta1.MsgVote";
pub const MSG_UNJAIL: &str = "/cosmos.slashing.v1beta1.MsgUnjail";
pub const MSG_VERIFY_INVARIANT: &str = "/cosmos.crisis.v1beta1.MsgVerifyInvariant";

/// Bank send only.
pub fn register_bank_send(registry: &mut TransformRegistry) {
    registry.register(MSG_SEND, send);
}

/// Every standard module transform.
pub fn register_all(registry: &mut TransformRegistry) {
    register_bank_send(registry);
    registry.register(MSG_MULTI_SEND, multi_send);

    registry.register(MSG_DELEGATE, delegate);
    registry.register(MSG_UNDELEGATE, undelegate);
    registry.register(MSG_BEGIN_REDELEGATE, begin_redelegate);
    registry.register(MSG_CREATE_VALIDATOR, create_validator);
    registry.register(MSG_EDIT_VALIDATOR, edit_validator);

    registry.register(MSG_SET_WITHDRAW_ADDRESS, set_withdraw_address);
    registry.register(MSG_WITHDRAW_DELEGATOR_REWARD, withdraw_delegator_reward);
    registry.register(MSG_WITHDRAW_VALIDATOR_COMMISSION, withdraw_validator_commission);

    registry.register(MSG_SUBMIT_PROPOSAL, submit_proposal);
    registry.register(MSG_DEPOSIT, deposit);
    registry.register(MSG_VOTE, vote);

    registry.register(MSG_UNJAIL, unjail);
    registry.register(MSG_VERIFY_INVARIANT, verify_invariant);
}

fn single(coin: &Option<Coin>) -> Vec<tidemark_core::models::Coin> {
    coin.iter().map(Coin::to_domain).collect()
}

// =============================================================================
// bank
// =============================================================================

fn send(msg: MsgSend, _ctx: &TransformContext<'_>) -> DomainResult<TransactionDraft> {
    Ok(TransactionDraft::new(TxType::Transfer, &msg)?
        .sent_by(msg.from_address.as_str())
        .recipient(msg.to_address.as_str())
        .amount(domain_coins(&msg.amount)))
}

/// Recorded from the first input to the first output.
fn multi_send(msg: MsgMultiSend, _ctx: &TransformContext<'_>) -> DomainResult<TransactionDraft> {
    let mut draft = TransactionDraft::new(TxType::Multisend, &msg)?;
    if let Some(input) = msg.inputs.first() {
        draft = draft
            .sent_by(input.address.as_str())
            .amount(domain_coins(&input.coins));
    }
    if let Some(output) = msg.outputs.first() {
        draft = draft.recipient(output.address.as_str());
    }
    Ok(draft)
}

// =============================================================================
// staking
// =============================================================================

fn delegate(msg: MsgDelegate, _ctx: &TransformContext<'_>) -> DomainResult<TransactionDraft> {
    Ok(TransactionDraft::new(TxType::Delegate, &msg)?
        .sent_by(msg.delegator_address.as_str())
        .recipient(msg.validator_address.as_str())
        .amount(single(&msg.amount)))
}

fn undelegate(msg: MsgUndelegate, _ctx: &TransformContext<'_>) -> DomainResult<TransactionDraft> {
    Ok(TransactionDraft::new(TxType::Unbond, &msg)?
        .sent_by(msg.delegator_address.as_str())
        .recipient(msg.validator_address.as_str())
        .amount(single(&msg.amount)))
}

/// Initiated by the delegator, moving stake between validators.
fn begin_redelegate(
    msg: MsgBeginRedelegate,
    _ctx: &TransformContext<'_>,
) -> DomainResult<TransactionDraft> {
    Ok(TransactionDraft::new(TxType::BeginRedelegate, &msg)?
        .initiator(msg.delegator_address.as_str())
        .sender(msg.validator_src_address.as_str())
        .recipient(msg.validator_dst_address.as_str())
        .amount(single(&msg.amount)))
}

fn create_validator(
    msg: MsgCreateValidator,
    _ctx: &TransformContext<'_>,
) -> DomainResult<TransactionDraft> {
    Ok(TransactionDraft::new(TxType::CreateValidator, &msg)?
        .sent_by(msg.delegator_address.as_str())
        .recipient(msg.validator_address.as_str())
        .amount(single(&msg.value)))
}

fn edit_validator(
    msg: MsgEditValidator,
    _ctx: &TransformContext<'_>,
) -> DomainResult<TransactionDraft> {
    Ok(TransactionDraft::new(TxType::EditValidator, &msg)?.sent_by(msg.validator_address.as_str()))
}

// =============================================================================
// distribution
// =============================================================================

fn set_withdraw_address(
    msg: MsgSetWithdrawAddress,
    _ctx: &TransformContext<'_>,
) -> DomainResult<TransactionDraft> {
    Ok(TransactionDraft::new(TxType::SetWithdrawAddress, &msg)?
        .sent_by(msg.delegator_address.as_str())
        .recipient(msg.withdraw_address.as_str()))
}

fn withdraw_delegator_reward(
    msg: MsgWithdrawDelegatorReward,
    _ctx: &TransformContext<'_>,
) -> DomainResult<TransactionDraft> {
    Ok(TransactionDraft::new(TxType::WithdrawDelegatorReward, &msg)?
        .sent_by(msg.delegator_address.as_str())
        .recipient(msg.validator_address.as_str()))
}

fn withdraw_validator_commission(
    msg: MsgWithdrawValidatorCommission,
    _ctx: &TransformContext<'_>,
) -> DomainResult<TransactionDraft> {
    Ok(TransactionDraft::new(TxType::WithdrawValidatorCommission, &msg)?
        .sent_by(msg.validator_address.as_str()))
}

// =============================================================================
// gov
// =============================================================================

fn submit_proposal(
    msg: MsgSubmitProposal,
    _ctx: &TransformContext<'_>,
) -> DomainResult<TransactionDraft> {
    Ok(TransactionDraft::new(TxType::SubmitProposal, &msg)?
        .sent_by(msg.proposer.as_str())
        .amount(domain_coins(&msg.initial_deposit)))
}

fn deposit(msg: MsgDeposit, _ctx: &TransformContext<'_>) -> DomainResult<TransactionDraft> {
    Ok(TransactionDraft::new(TxType::Deposit, &msg)?
        .sent_by(msg.depositor.as_str())
        .amount(domain_coins(&msg.amount)))
}

fn vote(msg: MsgVote, _ctx: &TransformContext<'_>) -> DomainResult<TransactionDraft> {
    Ok(TransactionDraft::new(TxType::Vote, &msg)?.sent_by(msg.voter.as_str()))
}

// =============================================================================
// slashing / crisis
// =============================================================================

fn unjail(msg: MsgUnjail, _ctx: &TransformContext<'_>) -> DomainResult<TransactionDraft> {
    Ok(TransactionDraft::new(TxType::Unjail, &msg)?.sent_by(msg.validator_addr.as_str()))
}

fn verify_invariant(
    msg: MsgVerifyInvariant,
    _ctx: &TransformContext<'_>,
) -> DomainResult<TransactionDraft> {
    Ok(TransactionDraft::new(TxType::VerifyInvariant, &msg)?.sent_by(msg.sender.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::bank::{Input, Output};
    use pretty_assertions::assert_eq;
    use prost::Message;
    use prost_types::Any;
    use bigdecimal::BigDecimal;
    use tidemark_core::error::DomainError;
    use tidemark_core::models::{Coin as DomainCoin, TxStatus};

    fn ctx() -> TransformContext<'static> {
        TransformContext {
            status: TxStatus::Success,
            events: &[],
            packet_events: &[],
        }
    }

    fn pack<M: Message>(type_url: &str, msg: &M) -> Any {
        Any {
            type_url: type_url.into(),
            value: msg.encode_to_vec(),
        }
    }

    fn registry() -> TransformRegistry {
        let mut registry = TransformRegistry::new();
        register_all(&mut registry);
        registry
    }

    fn coin(denom: &str, amount: &str) -> Coin {
        Coin {
            denom: denom.into(),
            amount: amount.into(),
        }
    }

    #[test]
    fn test_send() {
        let msg = MsgSend {
            from_address: "cosmos1alice".into(),
            to_address: "cosmos1bob".into(),
            amount: vec![coin("uatom", "100")],
        };
        let draft = registry().transform(&pack(MSG_SEND, &msg), &ctx()).unwrap();

        assert_eq!(draft.tx_type, TxType::Transfer);
        assert_eq!(draft.initiator, "cosmos1alice");
        assert_eq!(draft.from, "cosmos1alice");
        assert_eq!(draft.to, "cosmos1bob");
        assert_eq!(draft.amount, vec![DomainCoin::new("uatom", BigDecimal::from(100))]);
        assert_eq!(draft.msg["amount"][0]["denom"], "uatom");
        assert!(draft.packet_hash.is_none());
    }

    #[test]
    fn test_multi_send_uses_first_input_and_output() {
        let msg = MsgMultiSend {
            inputs: vec![Input {
                address: "cosmos1alice".into(),
                coins: vec![coin("uatom", "30")],
            }],
            outputs: vec![
                Output {
                    address: "cosmos1bob".into(),
                    coins: vec![coin("uatom", "10")],
                },
                Output {
                    address: "cosmos1carol".into(),
                    coins: vec![coin("uatom", "20")],
                },
            ],
        };
        let draft = registry()
            .transform(&pack(MSG_MULTI_SEND, &msg), &ctx())
            .unwrap();

        assert_eq!(draft.from, "cosmos1alice");
        assert_eq!(draft.to, "cosmos1bob");
        assert_eq!(draft.amount, vec![DomainCoin::new("uatom", BigDecimal::from(30))]);
    }

    // Test critique: le redelegate distingue initiateur et validateurs source/destination
    #[test]
    fn test_begin_redelegate_roles() {
        let msg = MsgBeginRedelegate {
            delegator_address: "cosmos1del".into(),
            validator_src_address: "cosmosvaloper1src".into(),
            validator_dst_address: "cosmosvaloper1dst".into(),
            amount: Some(coin("uatom", "5")),
        };
        let draft = registry()
            .transform(&pack(MSG_BEGIN_REDELEGATE, &msg), &ctx())
            .unwrap();

        assert_eq!(draft.initiator, "cosmos1del");
        assert_eq!(draft.from, "cosmosvaloper1src");
        assert_eq!(draft.to, "cosmosvaloper1dst");
    }

    #[test]
    fn test_delegate_without_amount() {
        let msg = MsgDelegate {
            delegator_address: "cosmos1del".into(),
            validator_address: "cosmosvaloper1val".into(),
            amount: None,
        };
        let draft = registry()
            .transform(&pack(MSG_DELEGATE, &msg), &ctx())
            .unwrap();
        assert_eq!(draft.tx_type, TxType::Delegate);
        assert!(draft.amount.is_empty());
    }

    #[test]
    fn test_vote_payload() {
        let msg = MsgVote {
            proposal_id: 12,
            voter: "cosmos1voter".into(),
            option: 1,
        };
        let draft = registry().transform(&pack(MSG_VOTE, &msg), &ctx()).unwrap();
        assert_eq!(draft.from, "cosmos1voter");
        assert_eq!(draft.msg["proposal_id"], 12);
        assert_eq!(draft.msg["option"], 1);
    }

    #[test]
    fn test_submit_proposal_records_initial_deposit() {
        let msg = MsgSubmitProposal {
            content: Some(Any {
                type_url: "/cosmos.gov.v1beta1.TextProposal".into(),
                value: vec![1, 2, 3],
            }),
            initial_deposit: vec![coin("uatom", "1000000")],
            proposer: "cosmos1prop".into(),
        };
        let draft = registry()
            .transform(&pack(MSG_SUBMIT_PROPOSAL, &msg), &ctx())
            .unwrap();
        assert_eq!(draft.amount.len(), 1);
        assert_eq!(draft.msg["content"]["type_url"], "/cosmos.gov.v1beta1.TextProposal");
    }

    #[test]
    fn test_corrupt_payload_is_decoding_error() {
        let any = Any {
            type_url: MSG_SEND.into(),
            value: vec![0x0a, 0xff],
        };
        assert!(matches!(
            registry().transform(&any, &ctx()),
            Err(DomainError::DecodingError(_))
        ));
    }

    #[test]
    fn test_all_standard_types_registered() {
        let registry = registry();
        for url in [
            MSG_SEND,
            MSG_MULTI_SEND,
            MSG_DELEGATE,
            MSG_UNDELEGATE,
            MSG_BEGIN_REDELEGATE,
            MSG_CREATE_VALIDATOR,
            MSG_EDIT_VALIDATOR,
            MSG_SET_WITHDRAW_ADDRESS,
            MSG_WITHDRAW_DELEGATOR_REWARD,
            MSG_WITHDRAW_VALIDATOR_COMMISSION,
            MSG_SUBMIT_PROPOSAL,
            MSG_DEPOSIT,
            MSG_VOTE,
            MSG_UNJAIL,
            MSG_VERIFY_INVARIANT,
        ] {
            assert!(registry.has_transform(url), "{url} missing");
        }
        assert_eq!(registry.len(), 15);
    }
}
