//! Core type definitions for transactions.
//!
//! [`TxType`] is the discriminant every other piece of the execution core
//! keys on: which payload to decode, which accounts may act as sender or
//! recipient, how much gas to charge, and whether an approver must co-sign.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// TxType
// ---------------------------------------------------------------------------

/// The operation a transaction performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TxType {
    /// Plain value transfer.
    Transfer,
    /// Sender pays a payment request signed by the recipient.
    TransferPay,
    /// Sender cashes an offline check drawn on the recipient's nonce table.
    TransferCash,
    /// One sender, many recipients.
    TransferMultiple,
    /// Change keepers, threshold, approver, or approve list.
    UpdateAccountInfo,
    /// Register one-time nonces for offline-signed payloads.
    UpdateNonceTable,
    /// Turn an empty `$SYMBOL` account into a token issuer.
    CreateToken,
    /// Retire a token whose whole supply is back with the issuer.
    DestroyToken,
    /// Turn an empty `#SYMBOL` account into a stake pool.
    CreateStake,
    /// Replace a stake pool's configuration.
    ResetStake,
    /// Dissolve a stake pool back into a plain account.
    DestroyStake,
    /// Deposit into a stake pool.
    TakeStake,
    /// Withdraw stake plus bonus from a stake pool.
    WithdrawStake,
    /// Set or clear the approver on the sender's stake entry.
    UpdateStakeApprover,
    /// Start lending from the sender's balance.
    OpenLending,
    /// Stop lending once every loan is repaid.
    CloseLending,
    /// Borrow from a lender's offline-signed offer.
    Borrow,
    /// Repay a loan with accrued interest.
    Repay,
    /// Buy from a seller's offline-signed order.
    Exchange,
}

impl TxType {
    /// Every transaction type, in declaration order.
    pub const ALL: [TxType; 19] = [
        TxType::Transfer,
        TxType::TransferPay,
        TxType::TransferCash,
        TxType::TransferMultiple,
        TxType::UpdateAccountInfo,
        TxType::UpdateNonceTable,
        TxType::CreateToken,
        TxType::DestroyToken,
        TxType::CreateStake,
        TxType::ResetStake,
        TxType::DestroyStake,
        TxType::TakeStake,
        TxType::WithdrawStake,
        TxType::UpdateStakeApprover,
        TxType::OpenLending,
        TxType::CloseLending,
        TxType::Borrow,
        TxType::Repay,
        TxType::Exchange,
    ];

    /// Types that change who controls an account, or tear it down. These
    /// need one signature more than the ordinary threshold.
    pub fn requires_plus_signing(&self) -> bool {
        matches!(
            self,
            TxType::UpdateAccountInfo | TxType::DestroyStake | TxType::DestroyToken
        )
    }

    /// Types allowed during genesis.
    pub fn allowed_at_genesis(&self) -> bool {
        matches!(
            self,
            TxType::Transfer
                | TxType::UpdateAccountInfo
                | TxType::CreateToken
                | TxType::CreateStake
        )
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tx{:?}", self)
    }
}

// ---------------------------------------------------------------------------
// Counter-party allow lists
// ---------------------------------------------------------------------------

/// Types a token account may send.
pub const TOKEN_FROM_TYPES: &[TxType] = &[
    TxType::Transfer,
    TxType::TransferPay,
    TxType::TransferMultiple,
    TxType::UpdateAccountInfo,
    TxType::UpdateNonceTable,
    TxType::DestroyToken,
    TxType::OpenLending,
    TxType::CloseLending,
];

/// Types a token account may receive.
pub const TOKEN_TO_TYPES: &[TxType] = &[
    TxType::Transfer,
    TxType::TransferPay,
    TxType::TransferCash,
    TxType::Borrow,
    TxType::Repay,
    TxType::Exchange,
];

/// Types a stake account may send.
pub const STAKE_FROM_TYPES: &[TxType] = &[
    TxType::Transfer,
    TxType::TransferPay,
    TxType::TransferMultiple,
    TxType::UpdateAccountInfo,
    TxType::UpdateNonceTable,
    TxType::ResetStake,
    TxType::DestroyStake,
    TxType::OpenLending,
    TxType::CloseLending,
];

/// Types a stake account may receive.
pub const STAKE_TO_TYPES: &[TxType] = &[
    TxType::Transfer,
    TxType::TransferCash,
    TxType::TakeStake,
    TxType::WithdrawStake,
    TxType::UpdateStakeApprover,
    TxType::Borrow,
    TxType::Repay,
];
