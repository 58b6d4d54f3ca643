//! Transaction errors. Every variant is prefixed with the transaction type
//! when displayed, e.g. `TxTransfer: Account(0x..).sub: insufficient ...`.

use thiserror::Error;

use super::types::TxType;
use crate::account::AccountError;
use crate::error::ErrorKind;
use crate::state::StateError;

#[derive(Debug, Error)]
pub enum TxError {
    /// Malformed fields or payload.
    #[error("{tx_type}: {reason}")]
    Syntax { tx_type: TxType, reason: String },

    /// Missing or insufficient signatures.
    #[error("{tx_type}: unauthorized, {reason}")]
    Unauthorized { tx_type: TxType, reason: String },

    /// A precondition on chain state or context does not hold.
    #[error("{tx_type}: {reason}")]
    Invalid { tx_type: TxType, reason: String },

    #[error("{tx_type}: {source}")]
    Account {
        tx_type: TxType,
        #[source]
        source: AccountError,
    },

    #[error("{tx_type}: {source}")]
    State {
        tx_type: TxType,
        #[source]
        source: StateError,
    },
}

impl TxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Syntax { .. } => ErrorKind::Structural,
            Self::Unauthorized { .. } => ErrorKind::Authorization,
            Self::Invalid { .. } => ErrorKind::InvalidState,
            Self::Account { source, .. } => source.kind(),
            Self::State { source, .. } => source.kind(),
        }
    }

    pub fn tx_type(&self) -> TxType {
        match self {
            Self::Syntax { tx_type, .. }
            | Self::Unauthorized { tx_type, .. }
            | Self::Invalid { tx_type, .. }
            | Self::Account { tx_type, .. }
            | Self::State { tx_type, .. } => *tx_type,
        }
    }
}

pub type TxResult<T> = Result<T, TxError>;

/// Tags account and state errors with the transaction type.
pub(crate) trait ForTx<T> {
    fn for_tx(self, tx_type: TxType) -> TxResult<T>;
}

impl<T> ForTx<T> for Result<T, AccountError> {
    fn for_tx(self, tx_type: TxType) -> TxResult<T> {
        self.map_err(|source| TxError::Account { tx_type, source })
    }
}

impl<T> ForTx<T> for Result<T, StateError> {
    fn for_tx(self, tx_type: TxType) -> TxResult<T> {
        self.map_err(|source| TxError::State { tx_type, source })
    }
}
