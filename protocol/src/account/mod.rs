//! # Accounts
//!
//! An [`Account`] is the unit of state the execution core mutates. It holds
//! the native balance, non-native token balances, the keeper set that
//! authorizes it, two anti-replay mechanisms (the sequential nonce and the
//! nonce table), and, for token and stake accounts, their configuration.
//! Stake and lending positions live in a separate [`AccountLedger`] that is
//! loaded on demand.
//!
//! ## Locking
//!
//! Every account guards its fields with a single `parking_lot::RwLock`.
//! Queries take the shared side, mutations the exclusive side, and no
//! method ever holds two accounts' locks at once. A transaction touching
//! two accounts is therefore atomic per account, not across them.
//!
//! ## Validate, then mutate
//!
//! Every mutating method checks all of its preconditions before writing
//! anything. A method that returns `Err` has left the account untouched.
//!
//! ## Module layout
//!
//! ```text
//! balance.rs      add / sub / gas debit / spendability checks
//! nonce_table.rs  secondary, expiry-scoped one-time nonces
//! keepers.rs      signature checks, approver rule, keeper updates
//! stake.rs        stake pool lifecycle and bonus distribution
//! lending.rs      lending lifecycle and compound interest
//! token.rs        token issuance and retirement
//! codec.rs        canonical blobs and change detection
//! ```

mod balance;
mod codec;
mod error;
mod keepers;
mod ledger;
mod lending;
mod nonce_table;
mod stake;
mod token;

pub use codec::AccountBlobs;
pub(crate) use keepers::{check_approve_list, check_keepers};
pub use error::{AccountError, AccountFault};
pub use lending::calc_borrow_total;
pub use ledger::{AccountLedger, LendingEntry, StakeEntry};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{FeeConfig, PPM};
use crate::crypto::PublicKey;
use crate::transaction::types::{
    TxType, STAKE_FROM_TYPES, STAKE_TO_TYPES, TOKEN_FROM_TYPES, TOKEN_TO_TYPES,
};
use crate::types::{Address, Amount, TokenSymbol};

// ---------------------------------------------------------------------------
// Configuration records
// ---------------------------------------------------------------------------

/// What an account is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountKind {
    /// Plain key-controlled account. Also the kind of the fee sink.
    #[default]
    Native,
    /// Token issuer living at a `$SYMBOL` address.
    Token,
    /// Stake pool living at a `#SYMBOL` address.
    Stake,
}

/// Stake pool parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeConfig {
    pub token: TokenSymbol,
    /// Unix seconds before which the pool is locked. 0 = never locked.
    pub lock_time: u64,
    /// Withdrawal fee in ppm, kept by the pool.
    pub withdraw_fee: u64,
    pub min_amount: Amount,
    pub max_amount: Amount,
}

impl StakeConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.token.is_valid() {
            return Err(format!("invalid stake token {}", self.token));
        }
        if self.withdraw_fee >= PPM {
            return Err(format!(
                "invalid withdraw fee, expected < {}, got {}",
                PPM, self.withdraw_fee
            ));
        }
        if self.max_amount.is_zero() || self.min_amount > self.max_amount {
            return Err(format!(
                "invalid stake amount range [{}, {}]",
                self.min_amount, self.max_amount
            ));
        }
        Ok(())
    }
}

/// Lending parameters. Interest rates are ppm per day.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingConfig {
    pub token: TokenSymbol,
    pub daily_interest: u64,
    /// Added to `daily_interest` once a loan is past its due time.
    pub overdue_interest: u64,
    pub min_amount: Amount,
    pub max_amount: Amount,
}

impl LendingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.token.is_valid() {
            return Err(format!("invalid lending token {}", self.token));
        }
        if self.daily_interest == 0 || self.daily_interest > PPM {
            return Err(format!(
                "invalid daily interest, expected 1..={}, got {}",
                PPM, self.daily_interest
            ));
        }
        if self.overdue_interest > PPM {
            return Err(format!(
                "invalid overdue interest, expected <= {}, got {}",
                PPM, self.overdue_interest
            ));
        }
        if self.max_amount.is_zero() || self.min_amount > self.max_amount {
            return Err(format!(
                "invalid lending amount range [{}, {}]",
                self.min_amount, self.max_amount
            ));
        }
        Ok(())
    }
}

/// The persisted account record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountData {
    pub address: Address,
    pub kind: AccountKind,
    pub nonce: u64,
    /// Native balance, pledge and NTB included.
    pub balance: Amount,
    pub threshold: u16,
    pub keepers: Vec<PublicKey>,
    pub approver: Option<PublicKey>,
    /// Types that need the approver's signature. Empty means every type.
    pub approve_list: Vec<TxType>,
    pub tokens: BTreeMap<TokenSymbol, Amount>,
    /// Expiry timestamp to the one-time nonces registered under it.
    pub nonce_table: BTreeMap<u64, Vec<u64>>,
    pub max_total_supply: Option<Amount>,
    pub stake: Option<StakeConfig>,
    pub lending: Option<LendingConfig>,
    /// Height and timestamp of the block that last changed the record.
    pub height: u64,
    pub timestamp: u64,
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// Per-block floors derived from the fee configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Floors {
    token_pledge: Amount,
    stake_pledge: Amount,
    ntb: Amount,
}

struct AccountInner {
    data: AccountData,
    ledger: Option<AccountLedger>,
    floors: Floors,
    now: u64,
    height: u64,
    data_hash: Option<[u8; 32]>,
    ledger_hash: Option<[u8; 32]>,
}

impl AccountInner {
    fn pledge(&self) -> Amount {
        match self.data.kind {
            AccountKind::Native => Amount::ZERO,
            AccountKind::Token => self.floors.token_pledge,
            AccountKind::Stake => self.floors.stake_pledge,
        }
    }

    fn is_empty(&self) -> bool {
        self.data.kind == AccountKind::Native
            && self.data.threshold == 0
            && self.data.keepers.is_empty()
            && self.data.approver.is_none()
            && self.data.max_total_supply.is_none()
            && self.data.stake.is_none()
            && self.data.lending.is_none()
    }

    fn is_fee_sink(&self) -> bool {
        self.data.address.is_empty()
    }

    /// Back to an empty plain account. Nonce, nonce table, and the last
    /// write height survive.
    fn reset(&mut self) {
        let d = &mut self.data;
        d.kind = AccountKind::Native;
        d.balance = Amount::ZERO;
        d.threshold = 0;
        d.keepers.clear();
        d.approver = None;
        d.approve_list.clear();
        d.tokens.clear();
        d.max_total_supply = None;
        d.stake = None;
        d.lending = None;
    }
}

/// A ledger account. Shared as `Arc<Account>`; every method takes `&self`.
pub struct Account {
    address: Address,
    inner: RwLock<AccountInner>,
}

impl Account {
    /// A fresh, empty plain account.
    pub fn new(address: Address) -> Self {
        Self::from_data(
            AccountData {
                address,
                ..Default::default()
            },
            None,
        )
    }

    fn from_data(data: AccountData, ledger: Option<AccountLedger>) -> Self {
        Self {
            address: data.address,
            inner: RwLock::new(AccountInner {
                data,
                ledger,
                floors: Floors::default(),
                now: 0,
                height: 0,
                data_hash: None,
                ledger_hash: None,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, AccountInner> {
        self.inner.read()
    }

    fn write(&self) -> RwLockWriteGuard<'_, AccountInner> {
        self.inner.write()
    }

    fn err(&self, op: &'static str, reason: AccountFault) -> AccountError {
        AccountError {
            address: self.address,
            op,
            reason,
        }
    }

    /// Binds the account to the block being executed: its clock and the
    /// pledge and NTB floors of the current fee schedule. The fee sink has
    /// no floors.
    pub fn init(&self, height: u64, timestamp: u64, fee: &FeeConfig) {
        let mut inner = self.write();
        inner.height = height;
        inner.now = timestamp;
        inner.floors = if inner.is_fee_sink() {
            Floors::default()
        } else {
            Floors {
                token_pledge: fee.min_token_pledge,
                stake_pledge: fee.min_stake_pledge,
                ntb: fee.non_transferable_balance,
            }
        };
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn kind(&self) -> AccountKind {
        self.read().data.kind
    }

    pub fn nonce(&self) -> u64 {
        self.read().data.nonce
    }

    pub fn threshold(&self) -> u16 {
        self.read().data.threshold
    }

    pub fn keepers(&self) -> Vec<PublicKey> {
        self.read().data.keepers.clone()
    }

    pub fn approver(&self) -> Option<PublicKey> {
        self.read().data.approver
    }

    pub fn approve_list(&self) -> Vec<TxType> {
        self.read().data.approve_list.clone()
    }

    pub fn stake_config(&self) -> Option<StakeConfig> {
        self.read().data.stake.clone()
    }

    pub fn lending_config(&self) -> Option<LendingConfig> {
        self.read().data.lending.clone()
    }

    pub fn max_total_supply(&self) -> Option<Amount> {
        self.read().data.max_total_supply
    }

    /// Current pledge floor.
    pub fn pledge(&self) -> Amount {
        self.read().pledge()
    }

    /// Current non-transferable floor on the native balance.
    pub fn ntb(&self) -> Amount {
        self.read().floors.ntb
    }

    /// `true` for a plain account nobody has configured yet. Balances may
    /// be non-zero.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn is_fee_sink(&self) -> bool {
        self.address.is_empty()
    }

    /// A copy of the persisted record.
    pub fn data(&self) -> AccountData {
        self.read().data.clone()
    }

    /// A copy of the ledger, if loaded.
    pub fn ledger(&self) -> Option<AccountLedger> {
        self.read().ledger.clone()
    }

    pub fn ledger_loaded(&self) -> bool {
        self.read().ledger.is_some()
    }

    /// Whether the account can act as a `kind` account.
    pub fn valid(&self, kind: AccountKind) -> bool {
        let inner = self.read();
        Self::valid_locked(&inner, kind)
    }

    fn valid_locked(inner: &AccountInner, kind: AccountKind) -> bool {
        if inner.is_fee_sink() {
            return true;
        }
        if inner.data.kind != kind {
            return false;
        }
        match kind {
            AccountKind::Token if inner.data.max_total_supply.map_or(true, |m| m.is_zero()) => return false,
            AccountKind::Stake if inner.data.stake.is_none() => return false,
            _ => {}
        }
        !inner.data.keepers.is_empty() && inner.data.balance >= inner.pledge()
    }

    /// Whether the account may send a `tx_type` transaction.
    pub fn check_as_from(&self, tx_type: TxType) -> Result<(), AccountError> {
        self.check_counterparty("check_as_from", tx_type, TOKEN_FROM_TYPES, STAKE_FROM_TYPES)
    }

    /// Whether the account may receive a `tx_type` transaction.
    pub fn check_as_to(&self, tx_type: TxType) -> Result<(), AccountError> {
        self.check_counterparty("check_as_to", tx_type, TOKEN_TO_TYPES, STAKE_TO_TYPES)
    }

    fn check_counterparty(
        &self,
        op: &'static str,
        tx_type: TxType,
        token_types: &[TxType],
        stake_types: &[TxType],
    ) -> Result<(), AccountError> {
        let inner = self.read();
        let kind = inner.data.kind;
        let allowed = match kind {
            AccountKind::Native => return Ok(()),
            AccountKind::Token => token_types,
            AccountKind::Stake => stake_types,
        };
        if !allowed.contains(&tx_type) {
            return Err(self.err(
                op,
                AccountFault::InvalidState(format!("{:?} account cannot handle {}", kind, tx_type)),
            ));
        }
        if !Self::valid_locked(&inner, kind) {
            return Err(self.err(
                op,
                AccountFault::InvalidState(format!("invalid {:?} account", kind)),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.read();
        f.debug_struct("Account")
            .field("address", &self.address)
            .field("kind", &inner.data.kind)
            .field("nonce", &inner.data.nonce)
            .field("balance", &inner.data.balance)
            .finish()
    }
}
