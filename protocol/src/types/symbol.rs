//! # Token and Stake Symbols
//!
//! Symbols are 20-byte values whose text form is right-aligned behind zero
//! padding, so every symbol is also a valid [`Address`]: the account that
//! issues a token or runs a stake pool lives at its symbol.
//!
//! ```text
//! "$GOLD"  ->  00 00 .. 00 24 47 4F 4C 44
//! "#POOL1" ->  00 00 .. 23 50 4F 4F 4C 31
//! ```
//!
//! Format: a prefix byte (`$` for tokens, `#` for stakes), then 1 to 10
//! characters from `[A-Z0-9]`, the first of which is a letter. The all-zero
//! token symbol is the native token.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::address::Address;

const TOKEN_PREFIX: u8 = b'$';
const STAKE_PREFIX: u8 = b'#';
const MAX_SYMBOL_CHARS: usize = 10;

/// Display name of the native token.
pub const NATIVE_TOKEN_NAME: &str = "NATIVE";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SymbolError {
    #[error("invalid token symbol {0:?}")]
    InvalidToken(String),

    #[error("invalid stake symbol {0:?}")]
    InvalidStake(String),
}

fn encode_symbol(prefix: u8, s: &str) -> Option<[u8; 20]> {
    let raw = s.as_bytes();
    if raw.len() < 2 || raw.len() > MAX_SYMBOL_CHARS + 1 {
        return None;
    }
    let mut bytes = [0u8; 20];
    bytes[20 - raw.len()..].copy_from_slice(raw);
    is_valid_symbol(prefix, &bytes).then_some(bytes)
}

fn is_valid_symbol(prefix: u8, bytes: &[u8; 20]) -> bool {
    let Some(start) = bytes.iter().position(|b| *b != 0) else {
        return false;
    };
    let body = &bytes[start..];
    if body.len() < 2 || body.len() > MAX_SYMBOL_CHARS + 1 || body[0] != prefix {
        return false;
    }
    body[1].is_ascii_uppercase()
        && body[2..]
            .iter()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

fn symbol_text(bytes: &[u8; 20]) -> &str {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(20);
    std::str::from_utf8(&bytes[start..]).unwrap_or("")
}

// ---------------------------------------------------------------------------
// TokenSymbol
// ---------------------------------------------------------------------------

/// A token symbol such as `$GOLD`, or the native token.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenSymbol([u8; 20]);

impl TokenSymbol {
    /// The native token.
    pub const NATIVE: TokenSymbol = TokenSymbol([0u8; 20]);

    pub fn new(s: &str) -> Result<Self, SymbolError> {
        encode_symbol(TOKEN_PREFIX, s)
            .map(Self)
            .ok_or_else(|| SymbolError::InvalidToken(s.to_string()))
    }

    /// Interprets an address as a token symbol, if its bytes form one.
    pub fn from_address(address: &Address) -> Option<Self> {
        let bytes = *address.as_bytes();
        is_valid_symbol(TOKEN_PREFIX, &bytes).then_some(Self(bytes))
    }

    pub fn is_native(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// `true` for the native token and for well-formed `$` symbols.
    pub fn is_valid(&self) -> bool {
        self.is_native() || is_valid_symbol(TOKEN_PREFIX, &self.0)
    }

    /// The account that issues this token.
    pub fn to_address(&self) -> Address {
        Address::from_bytes(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for TokenSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_native() {
            f.write_str(NATIVE_TOKEN_NAME)
        } else if self.is_valid() {
            f.write_str(symbol_text(&self.0))
        } else {
            write!(f, "0x{}", hex::encode(self.0))
        }
    }
}

impl fmt::Debug for TokenSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenSymbol({})", self)
    }
}

impl FromStr for TokenSymbol {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s == NATIVE_TOKEN_NAME {
            return Ok(Self::NATIVE);
        }
        Self::new(s)
    }
}

impl Serialize for TokenSymbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            self.0.as_slice().serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for TokenSymbol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(D::Error::custom)
        } else {
            let raw = Vec::<u8>::deserialize(deserializer)?;
            let bytes: [u8; 20] = raw
                .as_slice()
                .try_into()
                .map_err(|_| D::Error::custom("token symbol must be 20 bytes"))?;
            let symbol = Self(bytes);
            if !symbol.is_valid() {
                return Err(D::Error::custom("invalid token symbol bytes"));
            }
            Ok(symbol)
        }
    }
}

// ---------------------------------------------------------------------------
// StakeSymbol
// ---------------------------------------------------------------------------

/// A stake pool symbol such as `#POOL`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StakeSymbol([u8; 20]);

impl StakeSymbol {
    pub fn new(s: &str) -> Result<Self, SymbolError> {
        encode_symbol(STAKE_PREFIX, s)
            .map(Self)
            .ok_or_else(|| SymbolError::InvalidStake(s.to_string()))
    }

    pub fn from_address(address: &Address) -> Option<Self> {
        let bytes = *address.as_bytes();
        is_valid_symbol(STAKE_PREFIX, &bytes).then_some(Self(bytes))
    }

    pub fn to_address(&self) -> Address {
        Address::from_bytes(self.0)
    }
}

impl fmt::Display for StakeSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(symbol_text(&self.0))
    }
}

impl fmt::Debug for StakeSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StakeSymbol({})", self)
    }
}

impl FromStr for StakeSymbol {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_symbol_format() {
        assert!(TokenSymbol::new("$GOLD").is_ok());
        assert!(TokenSymbol::new("$A1234567890").is_err()); // 11 chars after '$'
        assert!(TokenSymbol::new("$A123456789").is_ok());
        assert!(TokenSymbol::new("$1ABC").is_err());
        assert!(TokenSymbol::new("$gold").is_err());
        assert!(TokenSymbol::new("GOLD").is_err());
        assert!(TokenSymbol::new("$").is_err());
        assert!(TokenSymbol::new("#GOLD").is_err());
    }

    #[test]
    fn token_symbol_is_right_aligned_address() {
        let sym = TokenSymbol::new("$AB").unwrap();
        let addr = sym.to_address();
        assert_eq!(&addr.as_bytes()[17..], b"$AB");
        assert!(addr.as_bytes()[..17].iter().all(|b| *b == 0));
        assert_eq!(TokenSymbol::from_address(&addr), Some(sym));
        assert_eq!(StakeSymbol::from_address(&addr), None);
        assert_eq!(sym.to_string(), "$AB");
    }

    #[test]
    fn native_token_display_and_parse() {
        assert_eq!(TokenSymbol::NATIVE.to_string(), NATIVE_TOKEN_NAME);
        assert_eq!("NATIVE".parse::<TokenSymbol>().unwrap(), TokenSymbol::NATIVE);
        assert_eq!("".parse::<TokenSymbol>().unwrap(), TokenSymbol::NATIVE);
        assert!(TokenSymbol::NATIVE.is_valid());
        assert_eq!(TokenSymbol::NATIVE.to_address(), Address::EMPTY);
        // The empty address is not a `$` symbol even though it is the native token.
        assert_eq!(TokenSymbol::from_address(&Address::EMPTY), None);
    }

    #[test]
    fn stake_symbol_format() {
        let s = StakeSymbol::new("#POOL1").unwrap();
        assert_eq!(s.to_string(), "#POOL1");
        assert_eq!(StakeSymbol::from_address(&s.to_address()), Some(s));
        assert!(StakeSymbol::new("#1POOL").is_err());
        assert!(StakeSymbol::new("$POOL").is_err());
    }

    #[test]
    fn symbol_serde_json_and_bincode() {
        let sym = TokenSymbol::new("$GOLD").unwrap();
        assert_eq!(serde_json::to_string(&sym).unwrap(), "\"$GOLD\"");
        let back: TokenSymbol = serde_json::from_str("\"$GOLD\"").unwrap();
        assert_eq!(back, sym);

        let bin = bincode::serialize(&sym).unwrap();
        let back: TokenSymbol = bincode::deserialize(&bin).unwrap();
        assert_eq!(back, sym);

        let junk = bincode::serialize(&[0xFFu8; 20].as_slice()).unwrap();
        assert!(bincode::deserialize::<TokenSymbol>(&junk).is_err());
    }
}
