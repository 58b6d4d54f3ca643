//! Type-specific payloads carried in [`TxData::data`](super::TxData).
//!
//! Payloads are bincode. Decoding is strict: the bytes must re-encode to
//! exactly what was received, so trailing garbage or non-canonical forms
//! are rejected and a counter-party's signature covers one meaning only.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::types::TxType;
use crate::account::{check_approve_list, check_keepers, LendingConfig, StakeConfig};
use crate::config::{MAX_SEND_TO, NONCE_TABLE_MAX_NONCES};
use crate::crypto::PublicKey;
use crate::types::{Address, Amount, TokenSymbol};

/// Common behavior of every payload.
pub trait Payload: Serialize + DeserializeOwned + PartialEq + Sized {
    /// Field-level checks that need no state.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    fn encode(&self) -> Vec<u8> {
        bincode::serialize(self).unwrap_or_default()
    }

    /// Strict decode followed by [`Payload::validate`].
    fn decode(data: &[u8]) -> Result<Self, String> {
        let value: Self =
            bincode::deserialize(data).map_err(|e| format!("invalid payload: {}", e))?;
        if value.encode() != data {
            return Err("invalid payload: non-canonical encoding".into());
        }
        value.validate()?;
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Transfers
// ---------------------------------------------------------------------------

/// An offline-signed transfer: a payment request signed by the payee
/// (`TransferPay`) or a check signed by the payer (`TransferCash`). The
/// signer's nonce table entry `(expire, nonce)` makes it single-use.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOrder {
    pub nonce: u64,
    pub expire: u64,
    /// Who pays. `None` lets anyone pay a payment request.
    pub from: Option<Address>,
    pub to: Address,
    pub token: TokenSymbol,
    pub amount: Amount,
    pub memo: String,
}

impl Payload for TransferOrder {
    fn validate(&self) -> Result<(), String> {
        if self.amount.is_zero() {
            return Err("invalid amount 0".into());
        }
        if !self.token.is_valid() {
            return Err(format!("invalid token {}", self.token));
        }
        if self.from == Some(self.to) {
            return Err("payer and payee are the same".into());
        }
        if self.memo.len() > 1024 {
            return Err("memo too long".into());
        }
        Ok(())
    }
}

/// One leg of a `TransferMultiple`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendTo {
    pub to: Address,
    pub amount: Amount,
}

impl Payload for Vec<SendTo> {
    fn validate(&self) -> Result<(), String> {
        if self.is_empty() || self.len() > MAX_SEND_TO {
            return Err(format!(
                "invalid recipients count, expected 1..={}, got {}",
                MAX_SEND_TO,
                self.len()
            ));
        }
        let mut seen = BTreeSet::new();
        for leg in self {
            if leg.amount.is_zero() {
                return Err(format!("invalid amount 0 to {}", leg.to));
            }
            if !seen.insert(leg.to) {
                return Err(format!("duplicate recipient {}", leg.to));
            }
        }
        Ok(())
    }
}

/// Sum of every leg, `None` on overflow.
pub fn send_to_total(legs: &[SendTo]) -> Option<Amount> {
    legs.iter()
        .try_fold(Amount::ZERO, |acc, l| acc.checked_add(l.amount))
}

// ---------------------------------------------------------------------------
// Accounts, tokens, stakes
// ---------------------------------------------------------------------------

/// Authorization and creation settings. `UpdateAccountInfo` uses the first
/// four fields; `CreateToken` also needs `max_total_supply`, and
/// `CreateStake` needs `stake`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdate {
    pub threshold: Option<u16>,
    pub keepers: Option<Vec<PublicKey>>,
    /// `Some(None)` clears the approver.
    pub approver: Option<Option<PublicKey>>,
    pub approve_list: Option<Vec<TxType>>,
    pub max_total_supply: Option<Amount>,
    pub stake: Option<StakeConfig>,
}

impl AccountUpdate {
    /// Threshold and keepers, which creation requires.
    pub fn keeper_set(&self) -> Result<(u16, Vec<PublicKey>), String> {
        match (self.threshold, &self.keepers) {
            (Some(t), Some(k)) => Ok((t, k.clone())),
            _ => Err("threshold and keepers are required".into()),
        }
    }
}

impl Payload for AccountUpdate {
    fn validate(&self) -> Result<(), String> {
        match (self.threshold, &self.keepers) {
            (Some(t), Some(k)) => check_keepers(t, k)?,
            (None, None) => {}
            _ => return Err("threshold and keepers must be updated together".into()),
        }
        if let Some(list) = &self.approve_list {
            check_approve_list(list)?;
        }
        if self.max_total_supply.is_some_and(|m| m.is_zero()) {
            return Err("invalid max total supply 0".into());
        }
        if let Some(cfg) = &self.stake {
            cfg.validate()?;
        }
        Ok(())
    }
}

impl Payload for StakeConfig {
    fn validate(&self) -> Result<(), String> {
        StakeConfig::validate(self)
    }
}

impl Payload for LendingConfig {
    fn validate(&self) -> Result<(), String> {
        LendingConfig::validate(self)
    }
}

/// Deposit (`TakeStake`) or withdrawal (`WithdrawStake`) request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeOrder {
    pub token: TokenSymbol,
    pub amount: Amount,
    /// Entry lock. Ignored on withdrawal.
    pub lock_time: u64,
}

impl Payload for StakeOrder {
    fn validate(&self) -> Result<(), String> {
        if self.amount.is_zero() {
            return Err("invalid amount 0".into());
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverUpdate {
    pub approver: Option<PublicKey>,
}

impl Payload for ApproverUpdate {}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceTableUpdate {
    pub expire: u64,
    pub nonces: Vec<u64>,
}

impl Payload for NonceTableUpdate {
    fn validate(&self) -> Result<(), String> {
        if self.nonces.is_empty() || self.nonces.len() > NONCE_TABLE_MAX_NONCES {
            return Err(format!(
                "invalid nonces count, expected 1..={}, got {}",
                NONCE_TABLE_MAX_NONCES,
                self.nonces.len()
            ));
        }
        let distinct: BTreeSet<&u64> = self.nonces.iter().collect();
        if distinct.len() != self.nonces.len() {
            return Err("duplicate nonce".into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Lending and exchange
// ---------------------------------------------------------------------------

/// A lender's offline-signed offer, consumed through the lender's nonce
/// table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowOrder {
    pub nonce: u64,
    pub expire: u64,
    pub lender: Address,
    /// Restricts the offer to one borrower.
    pub borrower: Option<Address>,
    pub token: TokenSymbol,
    pub amount: Amount,
    /// 0 = no due time.
    pub due_time: u64,
}

impl Payload for BorrowOrder {
    fn validate(&self) -> Result<(), String> {
        if self.amount.is_zero() {
            return Err("invalid amount 0".into());
        }
        if self.borrower == Some(self.lender) {
            return Err("lender cannot borrow from itself".into());
        }
        if self.due_time != 0 && self.due_time <= self.expire {
            return Err(format!(
                "due time {} not after expire {}",
                self.due_time, self.expire
            ));
        }
        Ok(())
    }
}

/// A seller's offline-signed order: `sell` for `receive` at `price` units
/// of `receive` per [`UNIT`](crate::config::UNIT) of `sell`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeOrder {
    pub nonce: u64,
    pub expire: u64,
    pub seller: Address,
    /// Restricts the order to one buyer.
    pub purchaser: Option<Address>,
    pub sell: TokenSymbol,
    pub receive: TokenSymbol,
    /// Most `sell` units one fill may take.
    pub quota: Amount,
    /// Fewest `sell` units one fill may take.
    pub minimum: Amount,
    pub price: Amount,
}

impl ExchangeOrder {
    /// `sell` units bought with `paid` units of `receive`, rounded down.
    pub fn quantity(&self, paid: Amount) -> Option<Amount> {
        paid.mul_div(Amount::from(crate::config::UNIT), self.price)
    }
}

impl Payload for ExchangeOrder {
    fn validate(&self) -> Result<(), String> {
        if self.sell == self.receive {
            return Err("sell and receive tokens are the same".into());
        }
        if self.price.is_zero() {
            return Err("invalid price 0".into());
        }
        if self.quota.is_zero() || self.minimum > self.quota {
            return Err(format!(
                "invalid quota range [{}, {}]",
                self.minimum, self.quota
            ));
        }
        if self.purchaser == Some(self.seller) {
            return Err("seller cannot buy its own order".into());
        }
        Ok(())
    }
}
