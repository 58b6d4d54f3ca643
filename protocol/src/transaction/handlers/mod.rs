//! One handler per [`TxType`].
//!
//! A handler is constructed from a [`TxBase`] by decoding and checking its
//! payload, so holding one means the transaction is well-formed. Handlers
//! that mutate beyond the base transfer do it after `accept`, once the
//! nonce has advanced, so the side effect cannot be replayed.
//!
//! ```text
//! transfer.rs  Transfer, TransferPay, TransferCash, TransferMultiple
//! account.rs   UpdateAccountInfo, UpdateNonceTable
//! token.rs     CreateToken, DestroyToken
//! stake.rs     CreateStake, ResetStake, DestroyStake, TakeStake,
//!              WithdrawStake, UpdateStakeApprover
//! lending.rs   OpenLending, CloseLending, Borrow, Repay
//! exchange.rs  Exchange
//! ```

mod account;
mod exchange;
mod lending;
mod stake;
mod token;
mod transfer;

pub use account::{TxUpdateAccountInfo, TxUpdateNonceTable};
pub use exchange::TxExchange;
pub use lending::{TxBorrow, TxCloseLending, TxOpenLending, TxRepay};
pub use stake::{
    TxCreateStake, TxDestroyStake, TxResetStake, TxTakeStake, TxUpdateStakeApprover,
    TxWithdrawStake,
};
pub use token::{TxCreateToken, TxDestroyToken};
pub use transfer::{TxTransfer, TxTransferCash, TxTransferMultiple, TxTransferPay};

use super::base::TxBase;
use super::error::{ForTx, TxResult};
use super::types::TxType;
use super::TxHandler;
use crate::account::Account;
use crate::state::BlockContext;

pub(crate) fn dispatch(base: TxBase) -> TxResult<Box<dyn TxHandler>> {
    Ok(match base.tx_type() {
        TxType::Transfer => Box::new(TxTransfer::new(base)?),
        TxType::TransferPay => Box::new(TxTransferPay::new(base)?),
        TxType::TransferCash => Box::new(TxTransferCash::new(base)?),
        TxType::TransferMultiple => Box::new(TxTransferMultiple::new(base)?),
        TxType::UpdateAccountInfo => Box::new(TxUpdateAccountInfo::new(base)?),
        TxType::UpdateNonceTable => Box::new(TxUpdateNonceTable::new(base)?),
        TxType::CreateToken => Box::new(TxCreateToken::new(base)?),
        TxType::DestroyToken => Box::new(TxDestroyToken::new(base)?),
        TxType::CreateStake => Box::new(TxCreateStake::new(base)?),
        TxType::ResetStake => Box::new(TxResetStake::new(base)?),
        TxType::DestroyStake => Box::new(TxDestroyStake::new(base)?),
        TxType::TakeStake => Box::new(TxTakeStake::new(base)?),
        TxType::WithdrawStake => Box::new(TxWithdrawStake::new(base)?),
        TxType::UpdateStakeApprover => Box::new(TxUpdateStakeApprover::new(base)?),
        TxType::OpenLending => Box::new(TxOpenLending::new(base)?),
        TxType::CloseLending => Box::new(TxCloseLending::new(base)?),
        TxType::Borrow => Box::new(TxBorrow::new(base)?),
        TxType::Repay => Box::new(TxRepay::new(base)?),
        TxType::Exchange => Box::new(TxExchange::new(base)?),
    })
}

/// An offline-signed order is usable until its expiry.
fn check_expire(base: &TxBase, ctx: &BlockContext, expire: u64) -> TxResult<()> {
    if expire < ctx.timestamp {
        return Err(base.invalid(format!(
            "order expired at {}, now {}",
            expire, ctx.timestamp
        )));
    }
    Ok(())
}

/// The counter-party signed the payload, with its approver if it has one
/// for this type.
fn authorize_counterparty(base: &TxBase, counterparty: &Account) -> TxResult<()> {
    let t = base.tx_type();
    let signers = base.ex_signers();
    counterparty.verify_signers(&signers, false).for_tx(t)?;
    counterparty.check_approver(t, &signers).for_tx(t)
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::transaction::testutil::*;
    use crate::transaction::{parse, TransactionBuilder, TxType};

    #[test]
    fn every_type_parses_or_fails_structurally() {
        let env = Env::new();
        let kp = key(1);
        for t in TxType::ALL {
            let tx = env.build(
                TransactionBuilder::new(t).to(key(2).address()),
                &kp.address(),
                &[&kp],
                &[],
            );
            if let Err(e) = parse(&tx) {
                assert_eq!(e.kind(), ErrorKind::Structural, "{}", t);
                assert_eq!(e.tx_type(), t);
            }
        }
    }

    #[test]
    fn plain_transfer_parses() {
        let env = Env::new();
        let kp = key(1);
        let tx = env.build(
            TransactionBuilder::new(TxType::Transfer)
                .to(key(2).address())
                .amount(1u64),
            &kp.address(),
            &[&kp],
            &[],
        );
        let handler = parse(&tx).unwrap();
        assert_eq!(handler.base().tx_type(), TxType::Transfer);
        assert_eq!(handler.base().amount(), 1u64);
    }
}
