//! # Signatures and Keeper Sets
//!
//! Ed25519 cannot recover a public key from a signature, so every signature
//! travels with the key that produced it as a [`SignatureEntry`]. Checking a
//! transaction then means: keep the entries that verify over the digest,
//! collect their keys into a signer set, and compare that set against an
//! account's keepers and threshold.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::keys::{Keypair, PublicKey, Signature};

/// A signature paired with the public key that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    pub signer: PublicKey,
    pub signature: Signature,
}

impl SignatureEntry {
    /// Sign `digest` with `keypair`.
    pub fn sign(keypair: &Keypair, digest: &[u8]) -> Self {
        Self {
            signer: keypair.public_key(),
            signature: keypair.sign(digest),
        }
    }

    pub fn is_valid(&self, digest: &[u8]) -> bool {
        self.signer.verify(digest, &self.signature)
    }
}

/// Returns the distinct keys whose signatures verify over `digest`.
///
/// Invalid entries are dropped silently; the threshold check downstream
/// decides whether what is left is enough.
pub fn verified_signers(digest: &[u8], entries: &[SignatureEntry]) -> BTreeSet<PublicKey> {
    entries
        .iter()
        .filter(|e| e.is_valid(digest))
        .map(|e| e.signer)
        .collect()
}

/// Counts how many keepers appear in `signers` and compares against
/// `threshold`. A zero threshold is never satisfied: an account that wants
/// to be controlled must say by how many.
pub fn satisfies_threshold(
    threshold: u16,
    keepers: &[PublicKey],
    signers: &BTreeSet<PublicKey>,
) -> bool {
    if threshold == 0 {
        return false;
    }
    let matched = keepers.iter().filter(|k| signers.contains(k)).count();
    matched >= threshold as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verified_signers_drops_invalid_and_duplicates() {
        let kp1 = Keypair::from_seed(&[1u8; 32]);
        let kp2 = Keypair::from_seed(&[2u8; 32]);
        let digest = b"digest";

        let good = SignatureEntry::sign(&kp1, digest);
        let forged = SignatureEntry {
            signer: kp2.public_key(),
            signature: kp1.sign(digest),
        };

        let signers = verified_signers(digest, &[good, good, forged]);
        assert_eq!(signers.len(), 1);
        assert!(signers.contains(&kp1.public_key()));
    }

    #[test]
    fn threshold_counts_only_keepers() {
        let kps: Vec<Keypair> = (1u8..=3).map(|i| Keypair::from_seed(&[i; 32])).collect();
        let keepers: Vec<PublicKey> = kps[..2].iter().map(|k| k.public_key()).collect();

        let signers: BTreeSet<PublicKey> = [kps[0].public_key(), kps[2].public_key()].into();
        assert!(satisfies_threshold(1, &keepers, &signers));
        assert!(!satisfies_threshold(2, &keepers, &signers));
        assert!(!satisfies_threshold(0, &keepers, &signers));
    }
}
