//! # Protocol Configuration & Constants
//!
//! Every magic number the execution core depends on lives here, together
//! with the two configuration records the block layer hands in:
//! [`FeeConfig`] and [`ChainConfig`].
//!
//! Some of these are consensus-critical. The nonce-table cap in particular
//! is part of the protocol: nodes that disagree on it disagree on state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::transaction::types::TxType;
use crate::types::Amount;

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// Smallest units per whole native token (9 decimals).
pub const UNIT: u64 = 1_000_000_000;

/// Parts-per-million denominator for interest and fee rates.
pub const PPM: u64 = 1_000_000;

/// Seconds in one interest-compounding day.
pub const SECONDS_PER_DAY: u64 = 86_400;

// ---------------------------------------------------------------------------
// Account limits
// ---------------------------------------------------------------------------

/// Maximum number of expiry groups in an account's nonce table.
///
/// Protocol constant. Changing it is a hard fork.
pub const NONCE_TABLE_MAX_GROUPS: usize = 1024;

/// Maximum number of nonces added to one expiry group per update.
pub const NONCE_TABLE_MAX_NONCES: usize = 1024;

/// Maximum number of keepers on an account.
pub const MAX_KEEPERS: usize = 255;

// ---------------------------------------------------------------------------
// Transaction limits
// ---------------------------------------------------------------------------

/// Upper bound on the opaque payload carried by a transaction.
pub const MAX_TX_DATA_SIZE: usize = 256 * 1024;

/// Maximum number of outputs in a multi-output transfer.
pub const MAX_SEND_TO: usize = 1024;

/// Maximum number of signatures (primary or extra) on one transaction.
pub const MAX_SIGNATURES: usize = 255;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Chain id used by the devnet configuration and tests.
pub const DEFAULT_CHAIN_ID: u64 = 2357;

/// Default gas charged before per-type overrides.
pub const DEFAULT_BASE_GAS: u64 = 100;

/// Default gas charged per byte of signable transaction data.
pub const DEFAULT_GAS_PER_BYTE: u64 = 1;

/// Default per-transaction gas ceiling.
pub const DEFAULT_MAX_TX_GAS: u64 = 42_000;

// ---------------------------------------------------------------------------
// FeeConfig
// ---------------------------------------------------------------------------

/// Fee schedule and account floors, as decided by the chain's governance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeConfig {
    /// Gas charged for every transaction type without an override.
    pub base_gas: u64,

    /// Per-type gas overrides (replace `base_gas` for that type).
    pub type_gas: BTreeMap<TxType, u64>,

    /// Gas per byte of the signable encoding.
    pub gas_per_byte: u64,

    /// Transactions computing more gas than this are rejected.
    pub max_tx_gas: u64,

    /// Native pledge a token account must keep to stay valid.
    pub min_token_pledge: Amount,

    /// Native pledge a stake account must keep to stay valid.
    pub min_stake_pledge: Amount,

    /// Native floor on every account that transfers cannot touch. Gas may.
    pub non_transferable_balance: Amount,
}

impl FeeConfig {
    /// Gas for `tx_type` carrying `signable_len` bytes.
    pub fn gas_for(&self, tx_type: TxType, signable_len: usize) -> u64 {
        let base = self.type_gas.get(&tx_type).copied().unwrap_or(self.base_gas);
        base.saturating_add((signable_len as u64).saturating_mul(self.gas_per_byte))
    }
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            base_gas: DEFAULT_BASE_GAS,
            type_gas: BTreeMap::new(),
            gas_per_byte: DEFAULT_GAS_PER_BYTE,
            max_tx_gas: DEFAULT_MAX_TX_GAS,
            min_token_pledge: Amount::from_u64(10_000 * UNIT),
            min_stake_pledge: Amount::from_u64(1_000 * UNIT),
            non_transferable_balance: Amount::from_u64(UNIT / 1_000),
        }
    }
}

// ---------------------------------------------------------------------------
// ChainConfig
// ---------------------------------------------------------------------------

/// Chain identity plus the fee schedule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub fee: FeeConfig,
}

impl ChainConfig {
    /// Parses a JSON configuration. Missing fields fall back to defaults.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            fee: FeeConfig::default(),
        }
    }
}
