//! # Cryptographic Primitives
//!
//! Thin, typed wrappers over audited implementations:
//!
//! - **Ed25519** (`ed25519-dalek`) for keeper and approver signatures.
//! - **BLAKE3** for addresses, digests, and the state root.
//! - **SHA-256** for transaction IDs.
//!
//! Nothing here is hand-rolled. Signature verification internals are the
//! library's business; this module only decides which keys signed what.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{blake3_hash, domain_separated_hash, double_sha256, merkle_root, sha256};
pub use keys::{KeyError, Keypair, PublicKey, Signature};
pub use signatures::{satisfies_threshold, verified_signers, SignatureEntry};
