//! Value transfers.
//!
//! - `Transfer`: sender to recipient.
//! - `TransferPay`: sender pays a payment request the recipient signed.
//!   The request is single-use through the recipient's nonce table.
//! - `TransferCash`: sender cashes a check the recipient drew. The check
//!   is paid through the drawer's nonce table.
//! - `TransferMultiple`: one sender, up to 1024 recipients.

use std::sync::Arc;

use super::{authorize_counterparty, check_expire};
use crate::account::Account;
use crate::state::{BlockContext, ChainState};
use crate::transaction::base::{transfer, TxBase};
use crate::transaction::error::{ForTx, TxResult};
use crate::transaction::payload::{send_to_total, SendTo, TransferOrder};
use crate::transaction::{TxHandler, TxReceipt};
use crate::types::Amount;

// ---------------------------------------------------------------------------
// Transfer
// ---------------------------------------------------------------------------

pub struct TxTransfer {
    base: TxBase,
}

impl TxTransfer {
    pub fn new(base: TxBase) -> TxResult<Self> {
        base.require_to()?;
        Ok(Self { base })
    }
}

impl TxHandler for TxTransfer {
    fn base(&self) -> &TxBase {
        &self.base
    }

    fn apply(&self, ctx: &BlockContext, state: &dyn ChainState) -> TxResult<TxReceipt> {
        Ok(self.base.verify(ctx, state)?.accept()?.receipt)
    }

    fn apply_genesis(&self, ctx: &BlockContext, state: &dyn ChainState) -> TxResult<TxReceipt> {
        let (from, to) = self.base.load_genesis(ctx, state)?;
        let to = to.ok_or_else(|| self.base.syntax("missing recipient"))?;
        transfer(
            self.base.tx_type(),
            &from,
            &to,
            self.base.token(),
            self.base.amount(),
        )?;
        Ok(self.base.genesis_receipt(ctx))
    }
}

// ---------------------------------------------------------------------------
// TransferPay
// ---------------------------------------------------------------------------

pub struct TxTransferPay {
    base: TxBase,
    order: TransferOrder,
}

impl TxTransferPay {
    pub fn new(base: TxBase) -> TxResult<Self> {
        let to = base.require_to()?;
        let order: TransferOrder = base.decode()?;
        if order.to != to {
            return Err(base.syntax(format!("order payee {} is not recipient {}", order.to, to)));
        }
        if order.from.is_some_and(|f| f != base.from()) {
            return Err(base.syntax("order is addressed to another payer"));
        }
        if order.token != base.token() || order.amount != base.amount() {
            return Err(base.syntax(format!(
                "order asks {} {}, got {} {}",
                order.amount,
                order.token,
                base.amount(),
                base.token()
            )));
        }
        Ok(Self { base, order })
    }
}

impl TxHandler for TxTransferPay {
    fn base(&self) -> &TxBase {
        &self.base
    }

    fn apply(&self, ctx: &BlockContext, state: &dyn ChainState) -> TxResult<TxReceipt> {
        let t = self.base.tx_type();
        let o = &self.order;
        let verified = self.base.verify(ctx, state)?;
        let payee = Arc::clone(verified.to_account()?);

        check_expire(&self.base, ctx, o.expire)?;
        authorize_counterparty(&self.base, &payee)?;
        payee.check_nonce_table(o.expire, o.nonce).for_tx(t)?;

        let accepted = verified.accept()?;
        // Zero debit: only consumes the request's nonce.
        payee
            .sub_by_nonce_table(o.token, o.expire, o.nonce, Amount::ZERO)
            .for_tx(t)?;
        Ok(accepted.receipt)
    }
}

// ---------------------------------------------------------------------------
// TransferCash
// ---------------------------------------------------------------------------

pub struct TxTransferCash {
    base: TxBase,
    order: TransferOrder,
}

impl TxTransferCash {
    pub fn new(base: TxBase) -> TxResult<Self> {
        let drawer = base.require_to()?;
        base.require_no_amount()?;
        let order: TransferOrder = base.decode()?;
        if order.from != Some(drawer) {
            return Err(base.syntax("check is not drawn on the recipient"));
        }
        if order.to != base.from() {
            return Err(base.syntax("check is payable to another account"));
        }
        if order.token != base.token() {
            return Err(base.syntax(format!(
                "check is in {}, got {}",
                order.token,
                base.token()
            )));
        }
        Ok(Self { base, order })
    }
}

impl TxHandler for TxTransferCash {
    fn base(&self) -> &TxBase {
        &self.base
    }

    fn apply(&self, ctx: &BlockContext, state: &dyn ChainState) -> TxResult<TxReceipt> {
        let t = self.base.tx_type();
        let o = &self.order;
        let verified = self.base.verify(ctx, state)?;
        let drawer = Arc::clone(verified.to_account()?);

        check_expire(&self.base, ctx, o.expire)?;
        authorize_counterparty(&self.base, &drawer)?;
        drawer.check_nonce_table(o.expire, o.nonce).for_tx(t)?;
        drawer.check_balance(&o.token, o.amount).for_tx(t)?;

        let accepted = verified.accept()?;
        drawer
            .sub_by_nonce_table(o.token, o.expire, o.nonce, o.amount)
            .for_tx(t)?;
        accepted.from.add(o.token, o.amount).for_tx(t)?;
        Ok(accepted.receipt)
    }
}

// ---------------------------------------------------------------------------
// TransferMultiple
// ---------------------------------------------------------------------------

pub struct TxTransferMultiple {
    base: TxBase,
    legs: Vec<SendTo>,
}

impl TxTransferMultiple {
    pub fn new(base: TxBase) -> TxResult<Self> {
        base.require_no_to()?;
        let legs: Vec<SendTo> = base.decode()?;
        let total = send_to_total(&legs).ok_or_else(|| base.syntax("total amount overflow"))?;
        if total != base.amount() {
            return Err(base.syntax(format!(
                "amount {} does not match recipients total {}",
                base.amount(),
                total
            )));
        }
        if legs.iter().any(|l| l.to == base.from()) {
            return Err(base.syntax("sender among recipients"));
        }
        Ok(Self { base, legs })
    }
}

impl TxHandler for TxTransferMultiple {
    fn base(&self) -> &TxBase {
        &self.base
    }

    fn apply(&self, ctx: &BlockContext, state: &dyn ChainState) -> TxResult<TxReceipt> {
        let t = self.base.tx_type();
        let verified = self.base.verify(ctx, state)?;
        let recipients = self
            .legs
            .iter()
            .map(|leg| {
                let acc = self.base.load_account(ctx, state, &leg.to)?;
                acc.check_as_to(t).for_tx(t)?;
                Ok((acc, leg.amount))
            })
            .collect::<TxResult<Vec<(Arc<Account>, Amount)>>>()?;

        let accepted = verified.accept_with(Amount::ZERO)?;
        for (to, amount) in recipients {
            transfer(t, &accepted.from, &to, self.base.token(), amount)?;
        }
        Ok(accepted.receipt)
    }
}
