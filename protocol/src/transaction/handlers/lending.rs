//! Lending.
//!
//! An account opens lending with a config, then signs loan offers offline
//! against its nonce table. A borrower takes an offer with `Borrow` and
//! pays it back, interest included, with `Repay`. Offers and repayments
//! are both addressed to the lender.

use std::sync::Arc;

use super::{authorize_counterparty, check_expire};
use crate::account::LendingConfig;
use crate::state::{BlockContext, ChainState};
use crate::transaction::base::TxBase;
use crate::transaction::error::{ForTx, TxResult};
use crate::transaction::payload::BorrowOrder;
use crate::transaction::{TxHandler, TxReceipt};

pub struct TxOpenLending {
    base: TxBase,
    config: LendingConfig,
}

impl TxOpenLending {
    pub fn new(base: TxBase) -> TxResult<Self> {
        base.require_no_to()?;
        base.require_no_amount()?;
        let config = base.decode()?;
        Ok(Self { base, config })
    }
}

impl TxHandler for TxOpenLending {
    fn base(&self) -> &TxBase {
        &self.base
    }

    fn apply(&self, ctx: &BlockContext, state: &dyn ChainState) -> TxResult<TxReceipt> {
        let verified = self.base.verify(ctx, state)?;
        self.base.load_ledger(state, &verified.from)?;
        let accepted = verified.accept()?;
        accepted
            .from
            .open_lending(self.config.clone())
            .for_tx(self.base.tx_type())?;
        Ok(accepted.receipt)
    }
}

pub struct TxCloseLending {
    base: TxBase,
}

impl TxCloseLending {
    pub fn new(base: TxBase) -> TxResult<Self> {
        base.require_no_to()?;
        base.require_no_amount()?;
        base.require_no_data()?;
        Ok(Self { base })
    }
}

impl TxHandler for TxCloseLending {
    fn base(&self) -> &TxBase {
        &self.base
    }

    fn apply(&self, ctx: &BlockContext, state: &dyn ChainState) -> TxResult<TxReceipt> {
        let verified = self.base.verify(ctx, state)?;
        self.base.load_ledger(state, &verified.from)?;
        let accepted = verified.accept()?;
        accepted
            .from
            .close_lending(false)
            .for_tx(self.base.tx_type())?;
        Ok(accepted.receipt)
    }
}

/// Takes a lender's signed offer. Sent by the borrower to the lender.
pub struct TxBorrow {
    base: TxBase,
    order: BorrowOrder,
}

impl TxBorrow {
    pub fn new(base: TxBase) -> TxResult<Self> {
        let lender = base.require_to()?;
        base.require_no_amount()?;
        let order: BorrowOrder = base.decode()?;
        if order.lender != lender {
            return Err(base.syntax(format!(
                "offer is from {}, not recipient {}",
                order.lender, lender
            )));
        }
        if order.borrower.is_some_and(|b| b != base.from()) {
            return Err(base.syntax("offer is addressed to another borrower"));
        }
        if order.token != base.token() {
            return Err(base.syntax(format!(
                "offer lends {}, got {}",
                order.token,
                base.token()
            )));
        }
        Ok(Self { base, order })
    }
}

impl TxHandler for TxBorrow {
    fn base(&self) -> &TxBase {
        &self.base
    }

    fn apply(&self, ctx: &BlockContext, state: &dyn ChainState) -> TxResult<TxReceipt> {
        let t = self.base.tx_type();
        let o = &self.order;
        let verified = self.base.verify(ctx, state)?;
        let lender = Arc::clone(verified.to_account()?);

        check_expire(&self.base, ctx, o.expire)?;
        authorize_counterparty(&self.base, &lender)?;
        lender.check_nonce_table(o.expire, o.nonce).for_tx(t)?;
        self.base.load_ledger(state, &lender)?;

        let accepted = verified.accept()?;
        lender
            .borrow(o.token, self.base.from(), o.amount, o.due_time)
            .for_tx(t)?;
        lender
            .sub_by_nonce_table(o.token, o.expire, o.nonce, o.amount)
            .for_tx(t)?;
        accepted.from.add(o.token, o.amount).for_tx(t)?;
        Ok(accepted.receipt)
    }
}

/// Pays back up to `amount`. Only what is owed is taken.
pub struct TxRepay {
    base: TxBase,
}

impl TxRepay {
    pub fn new(base: TxBase) -> TxResult<Self> {
        base.require_to()?;
        base.require_no_data()?;
        if base.amount().is_zero() {
            return Err(base.syntax("invalid amount 0"));
        }
        Ok(Self { base })
    }
}

impl TxHandler for TxRepay {
    fn base(&self) -> &TxBase {
        &self.base
    }

    fn apply(&self, ctx: &BlockContext, state: &dyn ChainState) -> TxResult<TxReceipt> {
        let t = self.base.tx_type();
        let verified = self.base.verify(ctx, state)?;
        let lender = Arc::clone(verified.to_account()?);
        self.base.load_ledger(state, &lender)?;

        let (token, borrower) = (self.base.token(), self.base.from());
        let paid = lender
            .repayable(token, borrower, self.base.amount())
            .for_tx(t)?;
        let accepted = verified.accept_with(paid)?;
        lender.repay(token, borrower, paid).for_tx(t)?;
        Ok(accepted.receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{calc_borrow_total, LendingEntry};
    use crate::config::SECONDS_PER_DAY;
    use crate::crypto::Keypair;
    use crate::error::ErrorKind;
    use crate::transaction::payload::NonceTableUpdate;
    use crate::transaction::testutil::*;
    use crate::transaction::{execute, Transaction, TransactionBuilder, TxType};
    use crate::types::{Amount, TokenSymbol};

    fn lending_config() -> LendingConfig {
        LendingConfig {
            token: TokenSymbol::NATIVE,
            daily_interest: 10_000,
            overdue_interest: 10_000,
            min_amount: 1u64.into(),
            max_amount: (100 * UNIT_NATIVE).into(),
        }
    }

    /// Alice lends; returns her offer for 10 units with nonce 5.
    fn open_lender(env: &Env, alice: &Keypair) -> BorrowOrder {
        env.fund(&alice.address(), 1_000 * UNIT_NATIVE);
        env.send(
            TransactionBuilder::new(TxType::OpenLending).payload(&lending_config()),
            alice,
        )
        .unwrap();
        let expire = env.ctx.timestamp + 1_000;
        env.send(
            TransactionBuilder::new(TxType::UpdateNonceTable).payload(&NonceTableUpdate {
                expire,
                nonces: vec![5],
            }),
            alice,
        )
        .unwrap();
        BorrowOrder {
            nonce: 5,
            expire,
            lender: alice.address(),
            borrower: None,
            token: TokenSymbol::NATIVE,
            amount: (10 * UNIT_NATIVE).into(),
            due_time: 0,
        }
    }

    fn borrow_tx(
        env: &Env,
        bob: &Keypair,
        lender: &Keypair,
        order: &BorrowOrder,
    ) -> Transaction {
        env.build(
            TransactionBuilder::new(TxType::Borrow)
                .to(order.lender)
                .payload(order),
            &bob.address(),
            &[bob],
            &[lender],
        )
    }

    #[test]
    fn borrow_accrue_repay_close() {
        let mut env = Env::new();
        let (alice, bob) = (key(1), key(2));
        let order = open_lender(&env, &alice);
        env.fund(&bob.address(), 100 * UNIT_NATIVE);
        let lender_before = env.balance(&alice.address());
        let bob_before = env.balance(&bob.address());

        let receipt = env.run(&borrow_tx(&env, &bob, &alice, &order)).unwrap();
        assert_eq!(
            env.balance(&bob.address()),
            bob_before + 10 * UNIT_NATIVE - receipt.cost()
        );
        assert_eq!(
            env.balance(&alice.address()),
            lender_before - 10 * UNIT_NATIVE
        );
        let borrowed_at = env.ctx.timestamp;

        // Lending cannot close with a loan outstanding.
        let err = env
            .send(TransactionBuilder::new(TxType::CloseLending), &alice)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        env.advance(SECONDS_PER_DAY);
        let owed = calc_borrow_total(
            &lending_config(),
            &LendingEntry {
                amount: (10 * UNIT_NATIVE).into(),
                update_at: borrowed_at,
                due_time: 0,
            },
            env.ctx.timestamp,
        );
        assert!(owed > 10 * UNIT_NATIVE);

        let lender_before = env.balance(&alice.address());
        let bob_before = env.balance(&bob.address());
        let receipt = env
            .send(
                TransactionBuilder::new(TxType::Repay)
                    .to(alice.address())
                    .amount(20 * UNIT_NATIVE),
                &bob,
            )
            .unwrap();
        assert_eq!(env.balance(&alice.address()), lender_before + owed);
        assert_eq!(
            env.balance(&bob.address()),
            bob_before - owed - receipt.cost()
        );

        let lender = env.account(&alice.address());
        env.state.load_ledger(&lender).unwrap();
        assert!(lender.ledger().unwrap().lending.is_empty());

        env.send(TransactionBuilder::new(TxType::CloseLending), &alice)
            .unwrap();
        assert!(env.account(&alice.address()).lending_config().is_none());
    }

    #[test]
    fn offer_is_single_use_and_signed() {
        let env = Env::new();
        let (alice, bob, mallory) = (key(1), key(2), key(3));
        let order = open_lender(&env, &alice);
        env.fund(&bob.address(), 100 * UNIT_NATIVE);

        let forged = borrow_tx(&env, &bob, &mallory, &order);
        assert_eq!(env.run(&forged).unwrap_err().kind(), ErrorKind::Authorization);

        env.run(&borrow_tx(&env, &bob, &alice, &order)).unwrap();
        let err = env.run(&borrow_tx(&env, &bob, &alice, &order)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NonceConflict);
    }

    #[test]
    fn repay_without_loan_is_rejected() {
        let env = Env::new();
        let (alice, bob) = (key(1), key(2));
        open_lender(&env, &alice);
        env.fund(&bob.address(), 100 * UNIT_NATIVE);

        let err = env
            .send(
                TransactionBuilder::new(TxType::Repay)
                    .to(alice.address())
                    .amount(UNIT_NATIVE),
                &bob,
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(env.account(&bob.address()).nonce(), 0);
    }

    #[test]
    fn failed_accept_leaves_loan_untouched() {
        let mut env = Env::new();
        let (alice, bob) = (key(1), key(2));
        let order = open_lender(&env, &alice);
        env.fund(&bob.address(), 100 * UNIT_NATIVE);
        env.run(&borrow_tx(&env, &bob, &alice, &order)).unwrap();
        env.advance(SECONDS_PER_DAY);

        let lender = env.account(&alice.address());
        env.state.load_ledger(&lender).unwrap();
        let loan = lender.ledger().unwrap().lending;

        // The builder cannot take the tip, so accepting fails.
        env.fund(&env.ctx.builder, Amount::MAX);
        let repay = env.build(
            TransactionBuilder::new(TxType::Repay)
                .to(alice.address())
                .amount(UNIT_NATIVE)
                .gas(1, 2),
            &bob.address(),
            &[&bob],
            &[],
        );
        assert!(execute(&repay, &env.ctx, &env.state).is_err());
        assert_eq!(lender.ledger().unwrap().lending, loan);
        env.state.discard();
    }
}
