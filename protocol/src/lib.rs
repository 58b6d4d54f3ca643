//! # LedgerVM Protocol
//!
//! The account ledger and transaction execution core of LedgerVM. This
//! crate decides whether a signed transaction may run against the current
//! chain state and, if so, applies it: balances, fees, nonces, keepers,
//! token issuance, stake pools, lending, and exchange orders.
//!
//! Block production, consensus, networking, and a VM for user contracts
//! live elsewhere; they drive this crate through [`transaction::execute`]
//! and a [`state::ChainState`].
//!
//! ## Architecture
//!
//! - **config**: Units, limits, and the fee schedule.
//! - **error**: [`error::ErrorKind`], the classification every error maps to.
//! - **crypto**: Ed25519 keys, signature sets, and hashing.
//! - **types**: Addresses and token/stake symbols.
//! - **account**: The account record, its ledger, and every state
//!   transition an account supports.
//! - **transaction**: Transaction format, signing, and one handler per
//!   transaction type.
//! - **state**: Account loading, caching, and commit over a key-value
//!   store (in memory or sled).
//!
//! ## Example
//!
//! ```
//! use ledgervm_protocol::types::{Address, TokenSymbol};
//!
//! let gold = TokenSymbol::new("$GOLD").unwrap();
//! assert!(!gold.to_address().is_empty());
//! assert!(Address::EMPTY.is_empty());
//! ```

pub mod account;
pub mod config;
pub mod crypto;
pub mod error;
pub mod state;
pub mod transaction;
pub mod types;

pub use error::ErrorKind;
