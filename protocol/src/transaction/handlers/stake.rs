//! Stake pools.
//!
//! A pool lives at a `#SYMBOL` address. Its keepers manage it (`ResetStake`,
//! `DestroyStake`, sent from the pool); anyone may deposit into it
//! (`TakeStake`) and withdraw their share (`WithdrawStake`), both sent to
//! the pool. Shares and bonus live in the pool's ledger, which every
//! handler here loads before touching the pool.

use std::sync::Arc;

use crate::account::{Account, StakeConfig};
use crate::crypto::PublicKey;
use crate::state::{BlockContext, ChainState};
use crate::transaction::base::{credit_all, transfer, TxBase};
use crate::transaction::error::{ForTx, TxResult};
use crate::transaction::payload::{AccountUpdate, ApproverUpdate, StakeOrder};
use crate::transaction::{TxHandler, TxReceipt};
use crate::types::{Address, StakeSymbol, TokenSymbol};

fn require_stake_address(base: &TxBase, address: &Address) -> TxResult<()> {
    if StakeSymbol::from_address(address).is_none() {
        return Err(base.syntax(format!("{} is not a stake symbol address", address)));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// CreateStake
// ---------------------------------------------------------------------------

pub struct TxCreateStake {
    base: TxBase,
    threshold: u16,
    keepers: Vec<PublicKey>,
    update: AccountUpdate,
    config: StakeConfig,
}

impl TxCreateStake {
    pub fn new(base: TxBase) -> TxResult<Self> {
        let to = base.require_to()?;
        require_stake_address(&base, &to)?;
        if !base.token().is_native() {
            return Err(base.syntax("pledge must be paid in the native token"));
        }
        let update: AccountUpdate = base.decode()?;
        let (threshold, keepers) = update.keeper_set().map_err(|e| base.syntax(e))?;
        let config = update
            .stake
            .clone()
            .ok_or_else(|| base.syntax("stake config is required"))?;
        if update.max_total_supply.is_some() {
            return Err(base.syntax("unexpected max total supply"));
        }
        Ok(Self {
            base,
            threshold,
            keepers,
            update,
            config,
        })
    }

    fn create(&self, pool: &Account) -> TxResult<()> {
        pool.create_stake(
            self.base.from(),
            self.threshold,
            self.keepers.clone(),
            self.update.approver.flatten(),
            self.update.approve_list.clone().unwrap_or_default(),
            self.config.clone(),
        )
        .for_tx(self.base.tx_type())
    }
}

impl TxHandler for TxCreateStake {
    fn base(&self) -> &TxBase {
        &self.base
    }

    fn apply(&self, ctx: &BlockContext, state: &dyn ChainState) -> TxResult<TxReceipt> {
        let verified = self.base.verify(ctx, state)?;
        let pool = Arc::clone(verified.to_account()?);
        self.base.load_ledger(state, &pool)?;
        if !pool.is_empty() {
            return Err(self.base.invalid(format!("stake {} exists", pool.address())));
        }
        let pledged = pool
            .balance_of(&TokenSymbol::NATIVE)
            .saturating_add(self.base.amount());
        if pledged < ctx.fee.min_stake_pledge {
            return Err(self.base.invalid(format!(
                "pledge {} below minimum {}",
                pledged, ctx.fee.min_stake_pledge
            )));
        }

        let accepted = verified.accept()?;
        self.create(&pool)?;
        Ok(accepted.receipt)
    }

    fn apply_genesis(&self, ctx: &BlockContext, state: &dyn ChainState) -> TxResult<TxReceipt> {
        let (from, to) = self.base.load_genesis(ctx, state)?;
        let pool = to.ok_or_else(|| self.base.syntax("missing recipient"))?;
        self.base.load_ledger(state, &pool)?;
        transfer(
            self.base.tx_type(),
            &from,
            &pool,
            TokenSymbol::NATIVE,
            self.base.amount(),
        )?;
        self.create(&pool)?;
        Ok(self.base.genesis_receipt(ctx))
    }
}

// ---------------------------------------------------------------------------
// ResetStake / DestroyStake
// ---------------------------------------------------------------------------

pub struct TxResetStake {
    base: TxBase,
    config: StakeConfig,
}

impl TxResetStake {
    pub fn new(base: TxBase) -> TxResult<Self> {
        require_stake_address(&base, &base.from())?;
        base.require_no_to()?;
        base.require_no_amount()?;
        let config = base.decode()?;
        Ok(Self { base, config })
    }
}

impl TxHandler for TxResetStake {
    fn base(&self) -> &TxBase {
        &self.base
    }

    fn apply(&self, ctx: &BlockContext, state: &dyn ChainState) -> TxResult<TxReceipt> {
        let verified = self.base.verify(ctx, state)?;
        self.base.load_ledger(state, &verified.from)?;
        let accepted = verified.accept()?;
        accepted
            .from
            .reset_stake(self.config.clone())
            .for_tx(self.base.tx_type())?;
        Ok(accepted.receipt)
    }
}

pub struct TxDestroyStake {
    base: TxBase,
}

impl TxDestroyStake {
    pub fn new(base: TxBase) -> TxResult<Self> {
        require_stake_address(&base, &base.from())?;
        base.require_to()?;
        base.require_no_amount()?;
        base.require_no_data()?;
        Ok(Self { base })
    }
}

impl TxHandler for TxDestroyStake {
    fn base(&self) -> &TxBase {
        &self.base
    }

    fn apply(&self, ctx: &BlockContext, state: &dyn ChainState) -> TxResult<TxReceipt> {
        let t = self.base.tx_type();
        let verified = self.base.verify(ctx, state)?;
        let recipient = Arc::clone(verified.to_account()?);
        self.base.load_ledger(state, &verified.from)?;

        let accepted = verified.accept()?;
        let balances = accepted
            .from
            .destroy_stake(recipient.address())
            .for_tx(t)?;
        credit_all(t, &recipient, balances)?;
        Ok(accepted.receipt)
    }
}

// ---------------------------------------------------------------------------
// TakeStake / WithdrawStake / UpdateStakeApprover
// ---------------------------------------------------------------------------

pub struct TxTakeStake {
    base: TxBase,
    order: StakeOrder,
}

impl TxTakeStake {
    pub fn new(base: TxBase) -> TxResult<Self> {
        let to = base.require_to()?;
        require_stake_address(&base, &to)?;
        let order: StakeOrder = base.decode()?;
        if order.token != base.token() || order.amount != base.amount() {
            return Err(base.syntax(format!(
                "order deposits {} {}, got {} {}",
                order.amount,
                order.token,
                base.amount(),
                base.token()
            )));
        }
        Ok(Self { base, order })
    }
}

impl TxHandler for TxTakeStake {
    fn base(&self) -> &TxBase {
        &self.base
    }

    fn apply(&self, ctx: &BlockContext, state: &dyn ChainState) -> TxResult<TxReceipt> {
        let verified = self.base.verify(ctx, state)?;
        let pool = Arc::clone(verified.to_account()?);
        self.base.load_ledger(state, &pool)?;

        let accepted = verified.accept()?;
        pool.take_stake(
            self.order.token,
            self.base.from(),
            self.order.amount,
            self.order.lock_time,
        )
        .for_tx(self.base.tx_type())?;
        Ok(accepted.receipt)
    }
}

pub struct TxWithdrawStake {
    base: TxBase,
    order: StakeOrder,
}

impl TxWithdrawStake {
    pub fn new(base: TxBase) -> TxResult<Self> {
        let to = base.require_to()?;
        require_stake_address(&base, &to)?;
        base.require_no_amount()?;
        let order: StakeOrder = base.decode()?;
        if order.token != base.token() {
            return Err(base.syntax(format!(
                "order withdraws {}, got {}",
                order.token,
                base.token()
            )));
        }
        Ok(Self { base, order })
    }
}

impl TxHandler for TxWithdrawStake {
    fn base(&self) -> &TxBase {
        &self.base
    }

    fn apply(&self, ctx: &BlockContext, state: &dyn ChainState) -> TxResult<TxReceipt> {
        let t = self.base.tx_type();
        let token = self.order.token;
        let verified = self.base.verify(ctx, state)?;
        let pool = Arc::clone(verified.to_account()?);
        self.base.load_ledger(state, &pool)?;

        let accepted = verified.accept()?;
        let signers = self.base.signers();
        let payout = pool
            .withdraw_stake(token, self.base.from(), self.order.amount, |approver| {
                signers.contains(approver)
            })
            .for_tx(t)?;
        accepted.from.add(token, payout).for_tx(t)?;
        Ok(accepted.receipt)
    }
}

/// Sets or clears the approver on the sender's stake entry. A current
/// approver must co-sign.
pub struct TxUpdateStakeApprover {
    base: TxBase,
    update: ApproverUpdate,
}

impl TxUpdateStakeApprover {
    pub fn new(base: TxBase) -> TxResult<Self> {
        let to = base.require_to()?;
        require_stake_address(&base, &to)?;
        base.require_no_amount()?;
        let update = base.decode()?;
        Ok(Self { base, update })
    }
}

impl TxHandler for TxUpdateStakeApprover {
    fn base(&self) -> &TxBase {
        &self.base
    }

    fn apply(&self, ctx: &BlockContext, state: &dyn ChainState) -> TxResult<TxReceipt> {
        let verified = self.base.verify(ctx, state)?;
        let pool = Arc::clone(verified.to_account()?);
        self.base.load_ledger(state, &pool)?;

        let accepted = verified.accept()?;
        let signers = self.base.signers();
        pool.update_stake_approver(self.base.from(), self.update.approver, |current| {
            signers.contains(current)
        })
        .for_tx(self.base.tx_type())?;
        Ok(accepted.receipt)
    }
}
