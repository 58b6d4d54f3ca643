//! Serde helper for fixed-size byte arrays.
//!
//! Human-readable formats (JSON config and replay files) get `0x`-prefixed
//! hex strings. Binary formats (the canonical bincode encoding) get the raw
//! bytes as a length-prefixed sequence.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn serialize<S: Serializer, const N: usize>(
    bytes: &[u8; N],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    if serializer.is_human_readable() {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    } else {
        bytes.as_slice().serialize(serializer)
    }
}

pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
    deserializer: D,
) -> Result<[u8; N], D::Error> {
    let raw: Vec<u8> = if deserializer.is_human_readable() {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim_start_matches("0x")).map_err(D::Error::custom)?
    } else {
        Vec::<u8>::deserialize(deserializer)?
    };
    let len = raw.len();
    raw.try_into()
        .map_err(|_| D::Error::custom(format!("expected {} bytes, got {}", N, len)))
}

/// Same treatment for variable-length byte strings, e.g. transaction data.
pub mod vec {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
        } else {
            bytes.serialize(serializer)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            hex::decode(s.trim_start_matches("0x")).map_err(D::Error::custom)
        } else {
            Vec::<u8>::deserialize(deserializer)
        }
    }
}
