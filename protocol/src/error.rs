//! Error classification shared by every layer of the execution core.
//!
//! Concrete error types live next to the code that raises them
//! ([`AccountError`](crate::account::AccountError),
//! [`TxError`](crate::transaction::TxError),
//! [`StateError`](crate::state::StateError)). Each of them maps onto one
//! [`ErrorKind`] so a block producer can decide what to do with a rejected
//! transaction without matching on message text.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse classification of a rejected operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed input. Retrying the same bytes will never succeed.
    Structural,
    /// Missing or insufficient signatures, or a wrong approver.
    Authorization,
    /// Not enough spendable balance for the requested debit.
    InsufficientBalance,
    /// A precondition on the current account state does not hold.
    InvalidState,
    /// Wrong primary nonce, or a secondary nonce missing or already present.
    NonceConflict,
    /// The backing key-value store failed or returned undecodable bytes.
    Storage,
}

impl ErrorKind {
    /// `true` when the same transaction may succeed against later state.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::InsufficientBalance | ErrorKind::InvalidState | ErrorKind::NonceConflict
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Structural => "structural",
            ErrorKind::Authorization => "authorization",
            ErrorKind::InsufficientBalance => "insufficient-balance",
            ErrorKind::InvalidState => "invalid-state",
            ErrorKind::NonceConflict => "nonce-conflict",
            ErrorKind::Storage => "storage",
        };
        f.write_str(s)
    }
}
