//! Stake pools.
//!
//! A stake account holds deposits of one token on behalf of stakers and
//! records each staker's share in the ledger. Anything the account holds
//! beyond the recorded shares (rewards sent to it, withdrawal fees kept by
//! it) is surplus, and surplus is handed out pro rata as bonus whenever the
//! shares are about to change.
//!
//! ```text
//! share = share + floor(share * (holding - sum(shares)) / sum(shares))
//! ```
//!
//! In a native pool the creator's share is seeded with the pledge. A
//! withdrawal that leaves other stakers behind must keep the pool able to
//! pay out every remaining share but the largest without dipping below the
//! pledge, so no staker is ever stranded in an invalid pool.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::ledger::{AccountLedger, StakeEntry};
use super::{Account, AccountError, AccountFault, AccountInner, AccountKind, StakeConfig};
use crate::config::PPM;
use crate::crypto::PublicKey;
use crate::transaction::types::TxType;
use crate::types::{Address, Amount, StakeSymbol, TokenSymbol};

fn stake_sum(ledger: &AccountLedger) -> Result<Amount, AccountFault> {
    ledger
        .stake_total()
        .ok_or_else(|| AccountFault::InvalidState("stake total overflow".into()))
}

/// Surplus of `holding` over the recorded shares and the share total.
fn surplus(ledger: &AccountLedger, holding: Amount) -> Result<(Amount, Amount), AccountFault> {
    let sum = stake_sum(ledger)?;
    Ok((holding.saturating_sub(sum), sum))
}

/// Shares after distributing the surplus. Nothing is written.
fn allocate_bonus(
    ledger: &AccountLedger,
    holding: Amount,
) -> Result<BTreeMap<Address, Amount>, AccountFault> {
    let (extra, sum) = surplus(ledger, holding)?;
    ledger
        .stake
        .iter()
        .map(|(addr, entry)| {
            let bonus = if extra.is_zero() {
                Some(Amount::ZERO)
            } else {
                entry.amount.mul_div(extra, sum)
            };
            bonus
                .and_then(|b| entry.amount.checked_add(b))
                .map(|v| (*addr, v))
                .ok_or_else(|| AccountFault::InvalidState("stake bonus overflow".into()))
        })
        .collect()
}

/// Whether a pool left holding `holding` against `shares` can still pay
/// out every share but the largest and keep `pledge`.
fn keeps_pledge(shares: &BTreeMap<Address, Amount>, holding: Amount, pledge: Amount) -> bool {
    let largest = shares.values().copied().max().unwrap_or_default();
    let others = shares
        .values()
        .try_fold(Amount::ZERO, |acc, v| acc.checked_add(*v))
        .map(|sum| sum.saturating_sub(largest));
    match others.and_then(|o| o.checked_add(pledge)) {
        Some(needed) => holding >= needed,
        None => false,
    }
}

impl AccountInner {
    fn stake_parts(&self) -> Result<(&StakeConfig, &AccountLedger), AccountFault> {
        if self.data.kind != AccountKind::Stake {
            return Err(AccountFault::InvalidState("not a stake account".into()));
        }
        let cfg = self
            .data
            .stake
            .as_ref()
            .ok_or_else(|| AccountFault::InvalidState("invalid stake config".into()))?;
        let ledger = self.ledger.as_ref().ok_or(AccountFault::LedgerNotLoaded)?;
        Ok((cfg, ledger))
    }

    fn check_unlocked(&self, lock_time: u64) -> Result<(), AccountFault> {
        if lock_time > self.now {
            return Err(AccountFault::StakeLocked(lock_time));
        }
        Ok(())
    }

    fn apply_shares(&mut self, shares: BTreeMap<Address, Amount>) {
        if let Some(ledger) = self.ledger.as_mut() {
            for (addr, amount) in shares {
                if let Some(entry) = ledger.stake.get_mut(&addr) {
                    entry.amount = amount;
                }
            }
        }
    }
}

impl Account {
    /// Turns this empty `#SYMBOL` account into a stake pool.
    ///
    /// The account must already hold its pledge. When the pool stakes the
    /// native token, the pledge is recorded as the creator's share.
    pub fn create_stake(
        &self,
        creator: Address,
        threshold: u16,
        keepers: Vec<PublicKey>,
        approver: Option<PublicKey>,
        approve_list: Vec<TxType>,
        config: StakeConfig,
    ) -> Result<(), AccountError> {
        const OP: &str = "create_stake";
        let invalid = |msg: String| self.err(OP, AccountFault::InvalidInput(msg));

        if StakeSymbol::from_address(&self.address).is_none() {
            return Err(invalid(format!("{} is not a stake symbol", self.address)));
        }
        config.validate().map_err(invalid)?;
        super::keepers::check_keepers(threshold, &keepers).map_err(invalid)?;
        super::keepers::check_approve_list(&approve_list).map_err(invalid)?;

        let mut inner = self.write();
        if inner.ledger.is_none() {
            return Err(self.err(OP, AccountFault::LedgerNotLoaded));
        }
        if !inner.is_empty() {
            return Err(self.err(OP, AccountFault::InvalidState("account not empty".into())));
        }
        let pledge = inner.floors.stake_pledge;
        if inner.data.balance < pledge {
            return Err(self.err(
                OP,
                AccountFault::InsufficientBalance {
                    token: TokenSymbol::NATIVE,
                    expected: pledge,
                    got: inner.data.balance,
                },
            ));
        }

        let native = config.token.is_native();
        inner.data.kind = AccountKind::Stake;
        inner.data.threshold = threshold;
        inner.data.keepers = keepers;
        inner.data.approver = approver;
        inner.data.approve_list = approve_list;
        inner.data.stake = Some(config);
        if native && !pledge.is_zero() {
            if let Some(ledger) = inner.ledger.as_mut() {
                ledger.stake.insert(
                    creator,
                    StakeEntry {
                        amount: pledge,
                        ..Default::default()
                    },
                );
            }
        }
        debug!(account = %self.address, %creator, "stake pool created");
        Ok(())
    }

    /// Current bonus rate of the pool's surplus, for display. Shares are
    /// always grown with exact integer arithmetic.
    pub fn stake_bonus_rate(&self) -> Result<f64, AccountError> {
        const OP: &str = "stake_bonus_rate";
        let inner = self.read();
        let (cfg, ledger) = inner.stake_parts().map_err(|e| self.err(OP, e))?;
        let (extra, sum) =
            surplus(ledger, inner.raw_balance(&cfg.token)).map_err(|e| self.err(OP, e))?;
        if sum.is_zero() {
            return Ok(0.0);
        }
        Ok(extra.to_f64() / sum.to_f64())
    }

    /// Records a deposit of `amount` for `staker`.
    ///
    /// Runs after the deposit has been credited to this account. The
    /// incoming amount is excluded from the surplus, and existing shares
    /// receive their bonus before the new share is added, so a staker never
    /// earns bonus on their own deposit or on rewards that predate it.
    pub fn take_stake(
        &self,
        token: TokenSymbol,
        staker: Address,
        amount: impl Into<Amount>,
        lock_time: u64,
    ) -> Result<(), AccountError> {
        const OP: &str = "take_stake";
        let amount = amount.into();
        let mut inner = self.write();
        let (cfg, ledger) = inner.stake_parts().map_err(|e| self.err(OP, e))?;

        if token != cfg.token {
            return Err(self.err(
                OP,
                AccountFault::InvalidInput(format!(
                    "invalid token, expected {}, got {}",
                    cfg.token, token
                )),
            ));
        }
        if amount.is_zero() || amount < cfg.min_amount {
            return Err(self.err(
                OP,
                AccountFault::InvalidInput(format!(
                    "invalid amount, expected >= {}, got {}",
                    cfg.min_amount, amount
                )),
            ));
        }
        if lock_time != 0 && lock_time <= cfg.lock_time {
            return Err(self.err(
                OP,
                AccountFault::InvalidInput(format!(
                    "invalid lock time, expected 0 or > {}, got {}",
                    cfg.lock_time, lock_time
                )),
            ));
        }

        let holding = inner
            .raw_balance(&token)
            .checked_sub(amount)
            .ok_or_else(|| {
                self.err(
                    OP,
                    AccountFault::InvalidState("stake deposit not credited".into()),
                )
            })?;
        let mut shares = allocate_bonus(ledger, holding).map_err(|e| self.err(OP, e))?;
        let total = shares
            .get(&staker)
            .copied()
            .unwrap_or_default()
            .checked_add(amount)
            .filter(|t| *t <= cfg.max_amount)
            .ok_or_else(|| {
                self.err(
                    OP,
                    AccountFault::InvalidInput(format!(
                        "stake exceeds max amount {}",
                        cfg.max_amount
                    )),
                )
            })?;
        shares.insert(staker, total);

        if let Some(ledger) = inner.ledger.as_mut() {
            let entry = ledger.stake.entry(staker).or_default();
            if lock_time > entry.lock_time {
                entry.lock_time = lock_time;
            }
        }
        inner.apply_shares(shares);
        debug!(account = %self.address, %staker, %amount, %total, "stake taken");
        Ok(())
    }

    /// Withdraws `amount` of `staker`'s share, debits what is paid out
    /// after the withdrawal fee from the pool, and returns it for the
    /// caller to credit to the staker. The fee stays in the pool.
    ///
    /// `approve` is asked whether the entry's approver signed, if it has
    /// one.
    pub fn withdraw_stake<F>(
        &self,
        token: TokenSymbol,
        staker: Address,
        amount: impl Into<Amount>,
        approve: F,
    ) -> Result<Amount, AccountError>
    where
        F: FnOnce(&PublicKey) -> bool,
    {
        const OP: &str = "withdraw_stake";
        let amount = amount.into();
        let mut inner = self.write();
        let (cfg, ledger) = inner.stake_parts().map_err(|e| self.err(OP, e))?;

        if token != cfg.token {
            return Err(self.err(
                OP,
                AccountFault::InvalidInput(format!(
                    "invalid token, expected {}, got {}",
                    cfg.token, token
                )),
            ));
        }
        inner
            .check_unlocked(cfg.lock_time)
            .map_err(|e| self.err(OP, e))?;
        let entry = ledger.stake.get(&staker).cloned().ok_or_else(|| {
            self.err(
                OP,
                AccountFault::InvalidState(format!("{} has no stake", staker)),
            )
        })?;
        inner
            .check_unlocked(entry.lock_time)
            .map_err(|e| self.err(OP, e))?;
        if let Some(approver) = entry.approver {
            if !approve(&approver) {
                return Err(self.err(
                    OP,
                    AccountFault::Unauthorized("stake approver signature required".into()),
                ));
            }
        }

        let withdraw_fee = cfg.withdraw_fee;
        let holding = inner.raw_balance(&token);
        let mut shares = allocate_bonus(ledger, holding).map_err(|e| self.err(OP, e))?;
        let share = shares.get(&staker).copied().unwrap_or_default();
        if amount.is_zero() || amount > share {
            return Err(self.err(
                OP,
                AccountFault::InvalidInput(format!(
                    "invalid amount, expected 1..={}, got {}",
                    share, amount
                )),
            ));
        }
        let fee = amount
            .mul_div(Amount::from(withdraw_fee), Amount::from(PPM))
            .ok_or_else(|| {
                self.err(OP, AccountFault::InvalidState("withdraw fee overflow".into()))
            })?;
        let payout = amount.saturating_sub(fee);
        let remaining = share.saturating_sub(amount);
        shares.insert(staker, remaining);

        let others_remain = shares.iter().any(|(a, v)| *a != staker && !v.is_zero());
        if token.is_native() && others_remain {
            let left = holding.saturating_sub(payout);
            if !keeps_pledge(&shares, left, inner.pledge()) {
                return Err(self.err(
                    OP,
                    AccountFault::InvalidState(format!(
                        "withdrawal of {} would strand other stakers below the pledge {}",
                        amount,
                        inner.pledge()
                    )),
                ));
            }
        }

        inner.debit(&token, payout).map_err(|e| self.err(OP, e))?;
        inner.apply_shares(shares);
        if remaining.is_zero() && entry.approver.is_none() {
            if let Some(ledger) = inner.ledger.as_mut() {
                ledger.stake.remove(&staker);
            }
        }
        debug!(account = %self.address, %staker, %amount, %fee, "stake withdrawn");
        Ok(payout)
    }

    /// Sets or clears the approver on `staker`'s entry. A current approver
    /// must agree to being replaced.
    pub fn update_stake_approver<F>(
        &self,
        staker: Address,
        approver: Option<PublicKey>,
        approve: F,
    ) -> Result<(), AccountError>
    where
        F: FnOnce(&PublicKey) -> bool,
    {
        const OP: &str = "update_stake_approver";
        let mut inner = self.write();
        let (_, ledger) = inner.stake_parts().map_err(|e| self.err(OP, e))?;
        let entry = ledger.stake.get(&staker).ok_or_else(|| {
            self.err(
                OP,
                AccountFault::InvalidState(format!("{} has no stake", staker)),
            )
        })?;
        if let Some(current) = entry.approver {
            if !approve(&current) {
                return Err(self.err(
                    OP,
                    AccountFault::Unauthorized("stake approver signature required".into()),
                ));
            }
        }

        if let Some(ledger) = inner.ledger.as_mut() {
            let drop_entry = match ledger.stake.get_mut(&staker) {
                Some(entry) => {
                    entry.approver = approver;
                    entry.amount.is_zero() && approver.is_none()
                }
                None => false,
            };
            if drop_entry {
                ledger.stake.remove(&staker);
            }
        }
        debug!(account = %self.address, %staker, "stake approver updated");
        Ok(())
    }

    /// Replaces the pool configuration. At most one staker may remain, the
    /// pool must be unlocked, and the token cannot change while anyone
    /// holds a share.
    pub fn reset_stake(&self, config: StakeConfig) -> Result<(), AccountError> {
        const OP: &str = "reset_stake";
        config
            .validate()
            .map_err(|e| self.err(OP, AccountFault::InvalidInput(e)))?;

        let mut inner = self.write();
        let (cfg, ledger) = inner.stake_parts().map_err(|e| self.err(OP, e))?;
        if ledger.stake.len() > 1 {
            return Err(self.err(
                OP,
                AccountFault::InvalidState(format!(
                    "too many stake holders, expected <= 1, got {}",
                    ledger.stake.len()
                )),
            ));
        }
        inner
            .check_unlocked(cfg.lock_time)
            .map_err(|e| self.err(OP, e))?;
        if !ledger.stake.is_empty() && cfg.token != config.token {
            return Err(self.err(
                OP,
                AccountFault::InvalidState("cannot change token while stake holders exist".into()),
            ));
        }

        inner.data.stake = Some(config);
        debug!(account = %self.address, "stake pool reset");
        Ok(())
    }

    /// Dissolves the pool into an empty plain account and returns every
    /// balance it held, for the caller to credit to `recipient`.
    ///
    /// The only remaining staker, if any, must be `recipient`. The pool
    /// must be unlocked and every loan it made repaid.
    pub fn destroy_stake(
        &self,
        recipient: Address,
    ) -> Result<BTreeMap<TokenSymbol, Amount>, AccountError> {
        const OP: &str = "destroy_stake";
        let mut inner = self.write();
        let (cfg, ledger) = inner.stake_parts().map_err(|e| self.err(OP, e))?;

        let holders: BTreeSet<&Address> = ledger.stake.keys().collect();
        if holders.len() > 1 || holders.iter().any(|h| **h != recipient) {
            return Err(self.err(
                OP,
                AccountFault::InvalidState(format!(
                    "stake holders remain other than recipient {}",
                    recipient
                )),
            ));
        }
        inner
            .check_unlocked(cfg.lock_time)
            .map_err(|e| self.err(OP, e))?;
        if !ledger.lending.is_empty() {
            return Err(self.err(
                OP,
                AccountFault::InvalidState("lending not fully repaid".into()),
            ));
        }

        let mut balances = inner.data.tokens.clone();
        if !inner.data.balance.is_zero() {
            balances.insert(TokenSymbol::NATIVE, inner.data.balance);
        }
        inner.reset();
        if let Some(ledger) = inner.ledger.as_mut() {
            ledger.stake.clear();
            ledger.lending.clear();
        }
        debug!(account = %self.address, %recipient, "stake pool destroyed");
        Ok(balances)
    }
}
