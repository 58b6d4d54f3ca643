//! The transaction envelope.
//!
//! A [`Transaction`] is the signable [`TxData`] plus two signature lists:
//! the sender's keepers sign the digest of `TxData`, and counter-parties
//! (payees, lenders, sellers) sign the digest of the payload bytes in
//! `data`, which exist before the enclosing transaction does.
//!
//! # Canonical Encoding
//!
//! Everything is bincode. Signing digests are BLAKE3 in derive-key mode
//! over the bincode bytes, with a different context string for the
//! transaction and for payloads. A payload digest also covers the chain
//! id, so a counter-party order only executes on the chain it was signed
//! for. The transaction ID is
//! `double_sha256(bincode(Transaction))`, signatures included.

use serde::{Deserialize, Serialize};

use super::types::TxType;
use crate::crypto::{domain_separated_hash, double_sha256, SignatureEntry};
use crate::types::{hex_bytes, Address, Amount, TokenSymbol};

const TX_DIGEST_CONTEXT: &str = "ledgervm 2024 transaction digest";
const PAYLOAD_DIGEST_CONTEXT: &str = "ledgervm 2024 payload digest";

/// The part of a transaction the sender signs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxData {
    pub tx_type: TxType,

    pub chain_id: u64,

    /// Sender's primary nonce.
    pub nonce: u64,

    /// Tip per gas unit offered to the block builder.
    pub gas_tip: u64,

    /// Highest total price per gas unit the sender accepts.
    pub gas_fee_cap: u64,

    pub from: Address,

    #[serde(default)]
    pub to: Option<Address>,

    /// `None` means the native token.
    #[serde(default)]
    pub token: Option<TokenSymbol>,

    #[serde(default)]
    pub amount: Option<Amount>,

    /// Type-specific payload, bincode-encoded.
    #[serde(default, with = "hex_bytes::vec")]
    pub data: Vec<u8>,
}

impl TxData {
    /// Canonical bytes the sender's keepers sign. Gas is charged on their
    /// length.
    pub fn signable_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).unwrap_or_default()
    }

    /// The digest the sender's keepers sign.
    pub fn digest(&self) -> [u8; 32] {
        domain_separated_hash(TX_DIGEST_CONTEXT, &self.signable_bytes())
    }

    /// The digest counter-parties sign over `data`.
    pub fn payload_digest(&self) -> [u8; 32] {
        payload_digest(self.chain_id, &self.data)
    }
}

/// Digest of encoded payload bytes on `chain_id`, as signed by a
/// counter-party.
pub fn payload_digest(chain_id: u64, data: &[u8]) -> [u8; 32] {
    let mut bytes = Vec::with_capacity(8 + data.len());
    bytes.extend_from_slice(&chain_id.to_le_bytes());
    bytes.extend_from_slice(data);
    domain_separated_hash(PAYLOAD_DIGEST_CONTEXT, &bytes)
}

/// A signed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub tx: TxData,

    /// Signatures over [`TxData::digest`].
    pub signatures: Vec<SignatureEntry>,

    /// Counter-party signatures over [`TxData::payload_digest`].
    #[serde(default)]
    pub ex_signatures: Vec<SignatureEntry>,
}

impl Transaction {
    pub fn new(tx: TxData) -> Self {
        Self {
            tx,
            signatures: Vec::new(),
            ex_signatures: Vec::new(),
        }
    }

    /// Transaction ID: `double_sha256` of the full canonical encoding.
    pub fn id(&self) -> [u8; 32] {
        double_sha256(&self.to_bytes())
    }

    pub fn id_hex(&self) -> String {
        hex::encode(self.id())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).unwrap_or_default()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }

    pub fn is_signed(&self) -> bool {
        !self.signatures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    fn sample() -> Transaction {
        Transaction::new(TxData {
            tx_type: TxType::Transfer,
            chain_id: 1,
            nonce: 3,
            gas_tip: 0,
            gas_fee_cap: 1,
            from: Address::from_bytes([1; 20]),
            to: Some(Address::from_bytes([2; 20])),
            token: None,
            amount: Some(100u64.into()),
            data: b"memo".to_vec(),
        })
    }

    #[test]
    fn signatures_do_not_change_digest_but_change_id() {
        let mut tx = sample();
        let (digest, id) = (tx.tx.digest(), tx.id());
        tx.signatures
            .push(SignatureEntry::sign(&Keypair::from_seed(&[1; 32]), &digest));
        assert_eq!(tx.tx.digest(), digest);
        assert_ne!(tx.id(), id);
        assert_eq!(tx.id_hex().len(), 64);
    }

    #[test]
    fn payload_and_tx_digests_are_separated() {
        let tx = sample();
        assert_ne!(tx.tx.payload_digest(), domain_separated_hash(TX_DIGEST_CONTEXT, &tx.tx.data));
        assert_eq!(tx.tx.payload_digest(), payload_digest(1, b"memo"));
    }

    #[test]
    fn payload_digest_is_bound_to_chain() {
        let tx = sample();
        let mut other = tx.clone();
        other.tx.chain_id = 2;
        assert_eq!(tx.tx.data, other.tx.data);
        assert_ne!(tx.tx.payload_digest(), other.tx.payload_digest());
        assert_ne!(payload_digest(1, b"memo"), payload_digest(2, b"memo"));
    }

    #[test]
    fn bincode_and_json_forms() {
        let tx = sample();
        assert_eq!(Transaction::from_bytes(&tx.to_bytes()).unwrap(), tx);

        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["tx"]["data"], "0x6d656d6f");
        assert_eq!(json["tx"]["tx_type"], "Transfer");
        let back: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(back, tx);
    }

    #[test]
    fn optional_fields_default_in_json() {
        let json = serde_json::json!({
            "tx": {
                "tx_type": "UpdateNonceTable",
                "chain_id": 1,
                "nonce": 0,
                "gas_tip": 0,
                "gas_fee_cap": 1,
                "from": "0x0101010101010101010101010101010101010101"
            },
            "signatures": []
        });
        let tx: Transaction = serde_json::from_value(json).unwrap();
        assert!(tx.tx.to.is_none());
        assert!(tx.tx.data.is_empty());
        assert!(tx.ex_signatures.is_empty());
    }
}
