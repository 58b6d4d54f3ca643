//! The account ledger: per-staker and per-borrower positions.
//!
//! Kept apart from the account record because most accounts never have
//! one, and the ones that do change it far less often than their balances.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::crypto::PublicKey;
use crate::types::{Address, Amount};

/// One staker's position in a stake pool.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeEntry {
    pub amount: Amount,
    /// Unix seconds before which the entry cannot be withdrawn. 0 = none.
    pub lock_time: u64,
    /// Key that must co-sign withdrawals from this entry.
    pub approver: Option<PublicKey>,
}

/// One borrower's outstanding loan.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingEntry {
    /// Principal plus interest accrued up to `update_at`.
    pub amount: Amount,
    pub update_at: u64,
    /// Unix seconds after which overdue interest applies. 0 = none.
    pub due_time: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLedger {
    pub stake: BTreeMap<Address, StakeEntry>,
    pub lending: BTreeMap<Address, LendingEntry>,
}

impl AccountLedger {
    pub fn is_empty(&self) -> bool {
        self.stake.is_empty() && self.lending.is_empty()
    }

    /// Sum of all stake entries. `None` on overflow.
    pub fn stake_total(&self) -> Option<Amount> {
        self.stake
            .values()
            .try_fold(Amount::ZERO, |acc, e| acc.checked_add(e.amount))
    }
}
