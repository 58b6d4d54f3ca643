//! # Hashing Utilities
//!
//! Two hash functions, each with a fixed job:
//!
//! - **BLAKE3**: addresses, signing digests, blob content hashes, and the
//!   state root. Everything LedgerVM-native.
//! - **SHA-256**: only through [`double_sha256`], which produces
//!   transaction IDs.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash and return a fixed-size array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute the double-SHA-256 hash: `SHA-256(SHA-256(data))`.
///
/// Transaction IDs use this construction over the full canonical encoding
/// (signatures included), so two transactions that differ only in their
/// signature sets get different IDs.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Compute the BLAKE3 hash of the input data.
///
/// # Example
///
/// ```
/// use ledgervm_protocol::crypto::blake3_hash;
///
/// let hash = blake3_hash(b"ledgervm");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Compute a domain-separated hash using BLAKE3's `derive_key` mode.
///
/// Signing digests go through here so a transaction digest can never be
/// confused with a payload digest signed by a counter-party.
pub fn domain_separated_hash(context: &str, data: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

/// Compute a Merkle root from a list of leaf hashes using BLAKE3.
///
/// Odd nodes are paired with themselves. An empty list yields `[0u8; 32]`.
pub fn merkle_root(leaves: &[[u8; 32]]) -> [u8; 32] {
    if leaves.is_empty() {
        return [0u8; 32];
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity((level.len() + 1) / 2);
        for chunk in level.chunks(2) {
            let mut hasher = blake3::Hasher::new();
            hasher.update(&chunk[0]);
            hasher.update(chunk.get(1).unwrap_or(&chunk[0]));
            next.push(*hasher.finalize().as_bytes());
        }
        level = next;
    }
    level[0]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // SHA-256("abc") from FIPS 180-2.
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn double_sha256_differs_from_single() {
        assert_ne!(double_sha256(b"tx"), sha256(b"tx"));
        assert_eq!(double_sha256(b"tx"), sha256(&sha256(b"tx")));
    }

    #[test]
    fn domain_separation_changes_digest() {
        let a = domain_separated_hash("ledgervm tx", b"payload");
        let b = domain_separated_hash("ledgervm payload", b"payload");
        assert_ne!(a, b);
        assert_ne!(a, blake3_hash(b"payload"));
    }

    #[test]
    fn merkle_root_edge_cases() {
        assert_eq!(merkle_root(&[]), [0u8; 32]);

        let leaf = blake3_hash(b"only");
        assert_eq!(merkle_root(&[leaf]), leaf);

        let a = blake3_hash(b"a");
        let b = blake3_hash(b"b");
        assert_ne!(merkle_root(&[a, b]), merkle_root(&[b, a]));
    }
}
