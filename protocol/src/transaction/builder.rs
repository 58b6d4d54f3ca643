//! Transaction construction via the builder pattern.
//!
//! The [`TransactionBuilder`] assembles the signable [`TxData`] and hands
//! back an unsigned [`Transaction`]. Signing happens in
//! [`super::signing`], so construction stays testable without key
//! material.

use super::payload::Payload;
use super::tx::{Transaction, TxData};
use super::types::TxType;
use crate::config::DEFAULT_CHAIN_ID;
use crate::types::{Address, Amount, TokenSymbol};

/// Fluent builder for unsigned transactions.
///
/// ```rust
/// use ledgervm_protocol::transaction::{TransactionBuilder, TxType};
/// use ledgervm_protocol::types::Address;
///
/// let tx = TransactionBuilder::new(TxType::Transfer)
///     .from(Address::from_bytes([1; 20]))
///     .to(Address::from_bytes([2; 20]))
///     .amount(1_000u64)
///     .nonce(0)
///     .build();
/// assert!(!tx.is_signed());
/// ```
///
/// Defaults: the devnet chain id, nonce 0, no tip, and a fee cap of 1 per
/// gas unit.
#[derive(Clone, Debug)]
pub struct TransactionBuilder {
    tx: TxData,
}

impl TransactionBuilder {
    pub fn new(tx_type: TxType) -> Self {
        Self {
            tx: TxData {
                tx_type,
                chain_id: DEFAULT_CHAIN_ID,
                nonce: 0,
                gas_tip: 0,
                gas_fee_cap: 1,
                from: Address::EMPTY,
                to: None,
                token: None,
                amount: None,
                data: Vec::new(),
            },
        }
    }

    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.tx.chain_id = chain_id;
        self
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.tx.nonce = nonce;
        self
    }

    /// Tip and fee cap, both per gas unit.
    pub fn gas(mut self, tip: u64, fee_cap: u64) -> Self {
        self.tx.gas_tip = tip;
        self.tx.gas_fee_cap = fee_cap;
        self
    }

    pub fn from(mut self, from: Address) -> Self {
        self.tx.from = from;
        self
    }

    pub fn to(mut self, to: Address) -> Self {
        self.tx.to = Some(to);
        self
    }

    pub fn token(mut self, token: TokenSymbol) -> Self {
        self.tx.token = Some(token);
        self
    }

    pub fn amount(mut self, amount: impl Into<Amount>) -> Self {
        self.tx.amount = Some(amount.into());
        self
    }

    /// Raw payload bytes.
    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.tx.data = data;
        self
    }

    /// Encodes `payload` into the data field.
    pub fn payload<P: Payload>(self, payload: &P) -> Self {
        self.data(payload.encode())
    }

    pub fn build(self) -> Transaction {
        Transaction::new(self.tx)
    }
}
