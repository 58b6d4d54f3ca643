//! # Chain State Interfaces
//!
//! The execution core never owns storage. It sees the chain through three
//! narrow seams:
//!
//! - [`BlockContext`]: the block being executed (height, time, gas price,
//!   builder, fee schedule).
//! - [`ChainState`]: hands out shared [`Account`] handles and loads their
//!   ledgers on demand.
//! - [`KvStore`]: a byte-blob key-value store under a `ChainState`.
//!
//! [`MemoryState`] is the reference `ChainState`: an account cache over any
//! `KvStore`, with `commit` producing a BLAKE3 Merkle root over every stored
//! blob, and `discard` dropping uncommitted changes.
//!
//! ## Key Layout
//!
//! | Key                   | Value                  |
//! |-----------------------|------------------------|
//! | `acct:` + address     | `bincode(AccountData)` |
//! | `ledger:` + address   | `bincode(AccountLedger)` |

pub mod memory;
pub mod store;

pub use memory::MemoryState;
pub use store::{MemoryStore, SledStore};

use std::sync::Arc;

use thiserror::Error;

use crate::account::{Account, AccountError};
use crate::config::{ChainConfig, FeeConfig};
use crate::error::ErrorKind;
use crate::types::Address;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StateError {
    #[error("store error: {0}")]
    Store(String),

    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error(transparent)]
    Account(#[from] AccountError),
}

impl StateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Account(e) => e.kind(),
            Self::Store(_) | Self::Sled(_) => ErrorKind::Storage,
        }
    }
}

pub type StateResult<T> = Result<T, StateError>;

// ---------------------------------------------------------------------------
// BlockContext
// ---------------------------------------------------------------------------

/// The block a transaction executes in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockContext {
    pub chain_id: u64,
    pub fee: FeeConfig,
    /// Base price per unit of gas, burned to the fee sink.
    pub gas_price: u64,
    /// Receives the tips.
    pub builder: Address,
    pub height: u64,
    /// Unix seconds.
    pub timestamp: u64,
}

impl BlockContext {
    /// A context for `height` under `config`, gas price 1, with the fee
    /// sink as builder.
    pub fn new(config: &ChainConfig, height: u64, timestamp: u64) -> Self {
        Self {
            chain_id: config.chain_id,
            fee: config.fee.clone(),
            gas_price: 1,
            builder: Address::EMPTY,
            height,
            timestamp,
        }
    }

    pub fn with_gas_price(mut self, gas_price: u64) -> Self {
        self.gas_price = gas_price;
        self
    }

    pub fn with_builder(mut self, builder: Address) -> Self {
        self.builder = builder;
        self
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Account access for transaction execution.
pub trait ChainState {
    /// The account at `address`, created empty if it was never stored.
    /// Repeated calls within a block return the same handle.
    fn load_account(&self, address: &Address) -> StateResult<Arc<Account>>;

    /// Loads `account`'s ledger unless it already is.
    fn load_ledger(&self, account: &Account) -> StateResult<()>;
}

/// Byte-blob storage under a [`ChainState`].
pub trait KvStore {
    fn get(&self, key: &[u8]) -> StateResult<Option<Vec<u8>>>;

    fn put(&self, key: &[u8], value: &[u8]) -> StateResult<()>;

    /// Every entry, sorted by key.
    fn entries(&self) -> StateResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Makes previous writes durable. No-op for volatile stores.
    fn flush(&self) -> StateResult<()> {
        Ok(())
    }
}

pub(crate) fn account_key(address: &Address) -> Vec<u8> {
    [b"acct:".as_slice(), address.as_bytes()].concat()
}

pub(crate) fn ledger_key(address: &Address) -> Vec<u8> {
    [b"ledger:".as_slice(), address.as_bytes()].concat()
}
