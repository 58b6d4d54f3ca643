use crate::account::Account;
use crate::state::{BlockContext, ChainState};
use crate::transaction::base::TxBase;
use crate::transaction::error::{ForTx, TxResult};
use crate::transaction::payload::{AccountUpdate, NonceTableUpdate};
use crate::transaction::{TxHandler, TxReceipt};

/// Replaces the sender's keepers, threshold, approver, or approve list.
pub struct TxUpdateAccountInfo {
    base: TxBase,
    update: AccountUpdate,
}

impl TxUpdateAccountInfo {
    pub fn new(base: TxBase) -> TxResult<Self> {
        base.require_no_to()?;
        base.require_no_amount()?;
        let update: AccountUpdate = base.decode()?;
        if update.max_total_supply.is_some() || update.stake.is_some() {
            return Err(base.syntax("supply and stake settings are fixed at creation"));
        }
        if update.keepers.is_none() && update.approver.is_none() && update.approve_list.is_none() {
            return Err(base.syntax("nothing to update"));
        }
        Ok(Self { base, update })
    }

    fn update(&self, acc: &Account) -> TxResult<()> {
        let u = self.update.clone();
        acc.update_keepers(u.threshold, u.keepers, u.approver, u.approve_list)
            .for_tx(self.base.tx_type())
    }
}

impl TxHandler for TxUpdateAccountInfo {
    fn base(&self) -> &TxBase {
        &self.base
    }

    fn apply(&self, ctx: &BlockContext, state: &dyn ChainState) -> TxResult<TxReceipt> {
        let accepted = self.base.verify(ctx, state)?.accept()?;
        self.update(&accepted.from)?;
        Ok(accepted.receipt)
    }

    fn apply_genesis(&self, ctx: &BlockContext, state: &dyn ChainState) -> TxResult<TxReceipt> {
        let (from, _) = self.base.load_genesis(ctx, state)?;
        self.update(&from)?;
        Ok(self.base.genesis_receipt(ctx))
    }
}

/// Registers one-time nonces for offline-signed orders.
pub struct TxUpdateNonceTable {
    base: TxBase,
    update: NonceTableUpdate,
}

impl TxUpdateNonceTable {
    pub fn new(base: TxBase) -> TxResult<Self> {
        base.require_no_to()?;
        base.require_no_amount()?;
        let update = base.decode()?;
        Ok(Self { base, update })
    }
}

impl TxHandler for TxUpdateNonceTable {
    fn base(&self) -> &TxBase {
        &self.base
    }

    fn apply(&self, ctx: &BlockContext, state: &dyn ChainState) -> TxResult<TxReceipt> {
        if self.update.expire <= ctx.timestamp {
            return Err(self.base.invalid(format!(
                "nonce table expire {} not after {}",
                self.update.expire, ctx.timestamp
            )));
        }
        let accepted = self.base.verify(ctx, state)?.accept()?;
        accepted
            .from
            .update_nonce_table(self.update.expire, &self.update.nonces)
            .for_tx(self.base.tx_type())?;
        Ok(accepted.receipt)
    }
}
