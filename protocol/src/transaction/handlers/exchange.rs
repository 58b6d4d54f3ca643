use std::sync::Arc;

use super::{authorize_counterparty, check_expire};
use crate::state::{BlockContext, ChainState};
use crate::transaction::base::TxBase;
use crate::transaction::error::{ForTx, TxResult};
use crate::transaction::payload::ExchangeOrder;
use crate::transaction::{TxHandler, TxReceipt};
use crate::types::Amount;

/// Fills a seller's signed order.
///
/// Sent by the buyer to the seller, paying `amount` of the order's
/// `receive` token. The buyer gets `amount * UNIT / price` of `sell`,
/// which must fall within the order's minimum and quota.
pub struct TxExchange {
    base: TxBase,
    order: ExchangeOrder,
    quantity: Amount,
}

impl TxExchange {
    pub fn new(base: TxBase) -> TxResult<Self> {
        let seller = base.require_to()?;
        let order: ExchangeOrder = base.decode()?;
        if order.seller != seller {
            return Err(base.syntax(format!(
                "order is from {}, not recipient {}",
                order.seller, seller
            )));
        }
        if order.purchaser.is_some_and(|p| p != base.from()) {
            return Err(base.syntax("order is addressed to another purchaser"));
        }
        if order.receive != base.token() {
            return Err(base.syntax(format!(
                "order receives {}, got {}",
                order.receive,
                base.token()
            )));
        }
        if base.amount().is_zero() {
            return Err(base.syntax("invalid amount 0"));
        }
        let quantity = order
            .quantity(base.amount())
            .ok_or_else(|| base.syntax("quantity overflow"))?;
        if quantity.is_zero() || quantity < order.minimum || quantity > order.quota {
            return Err(base.syntax(format!(
                "quantity {} outside [{}, {}]",
                quantity, order.minimum, order.quota
            )));
        }
        Ok(Self {
            base,
            order,
            quantity,
        })
    }
}

impl TxHandler for TxExchange {
    fn base(&self) -> &TxBase {
        &self.base
    }

    fn apply(&self, ctx: &BlockContext, state: &dyn ChainState) -> TxResult<TxReceipt> {
        let t = self.base.tx_type();
        let o = &self.order;
        let verified = self.base.verify(ctx, state)?;
        let seller = Arc::clone(verified.to_account()?);

        check_expire(&self.base, ctx, o.expire)?;
        authorize_counterparty(&self.base, &seller)?;
        seller.check_nonce_table(o.expire, o.nonce).for_tx(t)?;
        seller.check_balance(&o.sell, self.quantity).for_tx(t)?;

        let accepted = verified.accept()?;
        seller
            .sub_by_nonce_table(o.sell, o.expire, o.nonce, self.quantity)
            .for_tx(t)?;
        accepted.from.add(o.sell, self.quantity).for_tx(t)?;
        Ok(accepted.receipt)
    }
}
