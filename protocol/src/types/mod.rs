//! # Core Value Types
//!
//! Addresses, amounts, and the two symbol families that double as addresses:
//!
//! ```text
//! address.rs   - 20-byte account address, derived from an Ed25519 key
//! amount.rs    - non-negative 256-bit token amount
//! symbol.rs    - `$TOKEN` and `#STAKE` symbols, right-aligned in 20 bytes
//! hex_bytes.rs - serde helper: hex strings for JSON, raw bytes for bincode
//! ```

pub mod address;
pub mod amount;
pub mod hex_bytes;
pub mod symbol;

pub use address::Address;
pub use amount::{Amount, ParseAmountError};
pub use symbol::{StakeSymbol, SymbolError, TokenSymbol};
