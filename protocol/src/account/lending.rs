//! Lending: an account lends one token to borrowers at a daily compound
//! interest rate, with an extra overdue rate past a loan's due time.

use tracing::debug;

use super::ledger::LendingEntry;
use super::{Account, AccountError, AccountFault, AccountInner, LendingConfig};
use crate::config::{PPM, SECONDS_PER_DAY};
use crate::types::{Address, Amount, TokenSymbol};

/// What `entry` amounts to at `now`, interest included.
///
/// Interest compounds daily over fractional days:
/// `amount * (1 + rate) ^ (elapsed / 86400)`. An interval that crosses the
/// due time is split there, the part after it compounding at
/// `daily + overdue`. Only the interest goes through floating point: the
/// principal is carried exactly and the interest is truncated once, at the
/// end.
pub fn calc_borrow_total(config: &LendingConfig, entry: &LendingEntry, now: u64) -> Amount {
    if now <= entry.update_at || entry.amount.is_zero() {
        return entry.amount;
    }
    let daily = 1.0 + config.daily_interest as f64 / PPM as f64;
    let overdue =
        1.0 + (config.daily_interest as f64 + config.overdue_interest as f64) / PPM as f64;
    let days = |from: u64, to: u64| (to - from) as f64 / SECONDS_PER_DAY as f64;

    let factor = if entry.due_time == 0 || now <= entry.due_time {
        daily.powf(days(entry.update_at, now))
    } else if entry.update_at >= entry.due_time {
        overdue.powf(days(entry.update_at, now))
    } else {
        daily.powf(days(entry.update_at, entry.due_time)) * overdue.powf(days(entry.due_time, now))
    };
    Amount::from_f64_floor(entry.amount.to_f64() * (factor - 1.0))
        .and_then(|interest| entry.amount.checked_add(interest))
        .unwrap_or(Amount::MAX)
}

impl AccountInner {
    fn lending_parts(&self) -> Result<&LendingConfig, AccountFault> {
        if self.ledger.is_none() {
            return Err(AccountFault::LedgerNotLoaded);
        }
        self.data
            .lending
            .as_ref()
            .ok_or_else(|| AccountFault::InvalidState("lending not open".into()))
    }

    /// What `borrower` owes in `token` now, and the loan's due time.
    fn owed(&self, token: &TokenSymbol, borrower: &Address) -> Result<(Amount, u64), AccountFault> {
        let cfg = self.lending_parts()?;
        if *token != cfg.token {
            return Err(AccountFault::InvalidInput(format!(
                "invalid token, expected {}, got {}",
                cfg.token, token
            )));
        }
        let entry = self
            .ledger
            .as_ref()
            .and_then(|l| l.lending.get(borrower))
            .ok_or_else(|| AccountFault::InvalidState(format!("{} has no loan", borrower)))?;
        Ok((calc_borrow_total(cfg, entry, self.now), entry.due_time))
    }
}

impl Account {
    pub fn open_lending(&self, config: LendingConfig) -> Result<(), AccountError> {
        const OP: &str = "open_lending";
        config
            .validate()
            .map_err(|e| self.err(OP, AccountFault::InvalidInput(e)))?;

        let mut inner = self.write();
        if inner.ledger.is_none() {
            return Err(self.err(OP, AccountFault::LedgerNotLoaded));
        }
        if inner.data.lending.is_some() {
            return Err(self.err(OP, AccountFault::InvalidState("lending exists".into())));
        }
        inner.data.lending = Some(config);
        debug!(account = %self.address, "lending opened");
        Ok(())
    }

    /// Stops lending once every loan is repaid. With `ignore_none`, closing
    /// an account that never opened lending succeeds.
    pub fn close_lending(&self, ignore_none: bool) -> Result<(), AccountError> {
        const OP: &str = "close_lending";
        let mut inner = self.write();
        let ledger = inner
            .ledger
            .as_ref()
            .ok_or_else(|| self.err(OP, AccountFault::LedgerNotLoaded))?;
        if inner.data.lending.is_none() {
            if ignore_none {
                return Ok(());
            }
            return Err(self.err(OP, AccountFault::InvalidState("lending not open".into())));
        }
        if !ledger.lending.is_empty() {
            return Err(self.err(
                OP,
                AccountFault::InvalidState(format!(
                    "{} loans not repaid",
                    ledger.lending.len()
                )),
            ));
        }
        inner.data.lending = None;
        debug!(account = %self.address, "lending closed");
        Ok(())
    }

    /// Records a loan of `amount` to `borrower`. The caller moves the
    /// funds.
    ///
    /// Interest on an existing loan is compounded into it first, and the
    /// borrower's total may not exceed the configured maximum.
    pub fn borrow(
        &self,
        token: TokenSymbol,
        borrower: Address,
        amount: impl Into<Amount>,
        due_time: u64,
    ) -> Result<(), AccountError> {
        const OP: &str = "borrow";
        let amount = amount.into();
        let mut inner = self.write();
        let cfg = inner.lending_parts().map_err(|e| self.err(OP, e))?;
        let invalid = |msg: String| self.err(OP, AccountFault::InvalidInput(msg));

        if token != cfg.token {
            return Err(invalid(format!(
                "invalid token, expected {}, got {}",
                cfg.token, token
            )));
        }
        if due_time != 0 && due_time <= inner.now {
            return Err(invalid(format!(
                "invalid due time, expected > {}, got {}",
                inner.now, due_time
            )));
        }
        if amount.is_zero() || amount < cfg.min_amount {
            return Err(invalid(format!(
                "invalid amount, expected >= {}, got {}",
                cfg.min_amount, amount
            )));
        }

        let owed = inner
            .ledger
            .as_ref()
            .and_then(|l| l.lending.get(&borrower))
            .map(|e| calc_borrow_total(cfg, e, inner.now))
            .unwrap_or_default();
        let total = owed
            .checked_add(amount)
            .filter(|t| *t <= cfg.max_amount)
            .ok_or_else(|| {
                invalid(format!(
                    "borrow exceeds max amount {}, owed {}",
                    cfg.max_amount, owed
                ))
            })?;
        inner
            .check_balance(&token, amount, true)
            .map_err(|e| self.err(OP, e))?;

        let now = inner.now;
        if let Some(ledger) = inner.ledger.as_mut() {
            ledger.lending.insert(
                borrower,
                LendingEntry {
                    amount: total,
                    update_at: now,
                    due_time,
                },
            );
        }
        debug!(account = %self.address, %borrower, %amount, %total, "loan recorded");
        Ok(())
    }

    /// How much of `amount` a repayment by `borrower` would take: the
    /// smaller of `amount` and what is owed. Nothing is written.
    pub fn repayable(
        &self,
        token: TokenSymbol,
        borrower: Address,
        amount: impl Into<Amount>,
    ) -> Result<Amount, AccountError> {
        let (total, _) = self
            .read()
            .owed(&token, &borrower)
            .map_err(|e| self.err("repayable", e))?;
        Ok(amount.into().min(total))
    }

    /// Applies a repayment of up to `amount` and returns how much was
    /// actually owed and taken. A fully repaid loan is removed.
    pub fn repay(
        &self,
        token: TokenSymbol,
        borrower: Address,
        amount: impl Into<Amount>,
    ) -> Result<Amount, AccountError> {
        const OP: &str = "repay";
        let amount = amount.into();
        let mut inner = self.write();
        let (total, due_time) = inner
            .owed(&token, &borrower)
            .map_err(|e| self.err(OP, e))?;
        let now = inner.now;
        let paid = amount.min(total);
        let remaining = total.saturating_sub(paid);

        if let Some(ledger) = inner.ledger.as_mut() {
            if remaining.is_zero() {
                ledger.lending.remove(&borrower);
            } else {
                ledger.lending.insert(
                    borrower,
                    LendingEntry {
                        amount: remaining,
                        update_at: now,
                        due_time,
                    },
                );
            }
        }
        debug!(account = %self.address, %borrower, %paid, %remaining, "loan repaid");
        Ok(paid)
    }

    /// What `borrower` owes right now.
    pub fn borrow_total(&self, borrower: &Address) -> Option<Amount> {
        let inner = self.read();
        let cfg = inner.data.lending.as_ref()?;
        let entry = inner.ledger.as_ref()?.lending.get(borrower)?;
        Some(calc_borrow_total(cfg, entry, inner.now))
    }
}
