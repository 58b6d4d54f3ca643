//! Transaction signing with Ed25519 keypairs.
//!
//! Signing is a separate step from building because a transaction may need
//! several keepers, and counter-parties sign the payload on their own
//! machines before the sender ever sees it.

use super::tx::Transaction;
use crate::crypto::{Keypair, SignatureEntry};

/// Adds `keypair`'s signature over the transaction digest. Call once per
/// keeper. Returns the transaction for chaining.
///
/// ```rust
/// use ledgervm_protocol::crypto::Keypair;
/// use ledgervm_protocol::transaction::{sign_transaction, TransactionBuilder, TxType};
///
/// let kp = Keypair::generate();
/// let mut tx = TransactionBuilder::new(TxType::Transfer)
///     .from(kp.address())
///     .build();
/// sign_transaction(&mut tx, &kp);
/// assert!(tx.is_signed());
/// ```
pub fn sign_transaction<'a>(tx: &'a mut Transaction, keypair: &Keypair) -> &'a Transaction {
    let digest = tx.tx.digest();
    tx.signatures.push(SignatureEntry::sign(keypair, &digest));
    tx
}

/// Adds a counter-party signature over the payload bytes and the chain id.
pub fn sign_payload<'a>(tx: &'a mut Transaction, keypair: &Keypair) -> &'a Transaction {
    let digest = tx.tx.payload_digest();
    tx.ex_signatures.push(SignatureEntry::sign(keypair, &digest));
    tx
}
