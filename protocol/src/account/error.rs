use thiserror::Error;

use crate::error::ErrorKind;
use crate::types::{Address, Amount, TokenSymbol};

/// Why an account operation was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountFault {
    #[error("insufficient {token} balance, expected {expected}, got {got}")]
    InsufficientBalance {
        token: TokenSymbol,
        expected: Amount,
        got: Amount,
    },

    #[error("{token} balance overflow")]
    Overflow { token: TokenSymbol },

    #[error("invalid nonce, expected {expected}, got {got}")]
    NonceMismatch { expected: u64, got: u64 },

    #[error("nonce {nonce} not exists at {expire}")]
    NonceNotFound { expire: u64, nonce: u64 },

    #[error("nonce {nonce} exists at {expire}")]
    NonceExists { expire: u64, nonce: u64 },

    #[error("too many nonce groups, expected <= {max}, got {got}")]
    NonceTableFull { max: usize, got: usize },

    #[error("stake in lock, please retry after {0}")]
    StakeLocked(u64),

    #[error("invalid ledger")]
    LedgerNotLoaded,

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("codec: {0}")]
    Codec(String),
}

impl AccountFault {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccountFault::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            AccountFault::NonceMismatch { .. }
            | AccountFault::NonceNotFound { .. }
            | AccountFault::NonceExists { .. } => ErrorKind::NonceConflict,
            AccountFault::InvalidInput(_) => ErrorKind::Structural,
            AccountFault::Unauthorized(_) => ErrorKind::Authorization,
            AccountFault::Codec(_) => ErrorKind::Storage,
            AccountFault::Overflow { .. }
            | AccountFault::NonceTableFull { .. }
            | AccountFault::StakeLocked(_)
            | AccountFault::LedgerNotLoaded
            | AccountFault::InvalidState(_) => ErrorKind::InvalidState,
        }
    }
}

/// A refused account operation, prefixed with the account and operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Account({address}).{op}: {reason}")]
pub struct AccountError {
    pub address: Address,
    pub op: &'static str,
    pub reason: AccountFault,
}

impl AccountError {
    pub fn kind(&self) -> ErrorKind {
        self.reason.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_address_and_op() {
        let err = AccountError {
            address: Address::EMPTY,
            op: "sub",
            reason: AccountFault::InsufficientBalance {
                token: TokenSymbol::NATIVE,
                expected: 1u64.into(),
                got: Amount::ZERO,
            },
        };
        assert_eq!(
            err.to_string(),
            format!(
                "Account(0x{}).sub: insufficient NATIVE balance, expected 1, got 0",
                "00".repeat(20)
            )
        );
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
    }
}
