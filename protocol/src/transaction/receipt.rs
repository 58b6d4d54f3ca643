//! What an applied transaction leaves behind for the caller.

use serde::{Deserialize, Serialize};

use super::types::TxType;
use crate::types::Address;

/// Outcome of a successfully applied transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    /// Hex transaction ID.
    pub tx_id: String,
    pub tx_type: TxType,
    pub from: Address,
    pub to: Option<Address>,
    pub height: u64,
    /// Gas units charged.
    pub gas: u64,
    /// Burned to the fee sink.
    pub base_fee: u64,
    /// Paid to the block builder.
    pub tip: u64,
}

impl TxReceipt {
    /// Total native units the sender paid in fees.
    pub fn cost(&self) -> u64 {
        self.base_fee.saturating_add(self.tip)
    }
}
