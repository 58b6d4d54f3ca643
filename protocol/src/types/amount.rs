//! Token amounts.
//!
//! Every balance, ledger position, supply, and transfer amount is an
//! [`Amount`]: a non-negative 256-bit integer. Ledger code only uses the
//! checked forms; the operator impls panic on overflow like the primitive
//! integers do and exist for tests and tooling.
//!
//! Human-readable formats carry a decimal string (JSON numbers are accepted
//! too). Binary formats carry 32 big-endian bytes.

use primitive_types::{U256, U512};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

use super::hex_bytes;

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(U256);

impl Amount {
    pub const ZERO: Amount = Amount(U256([0; 4]));
    pub const MAX: Amount = Amount(U256::MAX);

    pub const fn from_u64(v: u64) -> Self {
        Self(U256([v, 0, 0, 0]))
    }

    pub fn from_u256(v: U256) -> Self {
        Self(v)
    }

    pub fn as_u256(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// The value as `u64`, if it fits.
    pub fn to_u64(&self) -> Option<u64> {
        (self.0.bits() <= 64).then(|| self.0.low_u64())
    }

    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    pub fn saturating_add(self, rhs: Amount) -> Amount {
        Self(self.0.saturating_add(rhs.0))
    }

    pub fn saturating_sub(self, rhs: Amount) -> Amount {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// `floor(self * num / den)`, exact. The product is taken at 512 bits,
    /// so only a quotient that does not fit in 256 bits fails. `None` then,
    /// or on a zero denominator.
    pub fn mul_div(self, num: Amount, den: Amount) -> Option<Amount> {
        if den.is_zero() {
            return None;
        }
        let q = self.0.full_mul(num.0) / U512::from(den.0);
        U256::try_from(q).ok().map(Self)
    }

    /// Nearest `f64`. Exact below 2^53.
    pub fn to_f64(&self) -> f64 {
        self.0
             .0
            .iter()
            .rev()
            .fold(0.0, |acc, &limb| acc * 18_446_744_073_709_551_616.0 + limb as f64)
    }

    /// `floor(x)` for a finite, non-negative `x`. `None` otherwise, or when
    /// `x` does not fit in 256 bits.
    pub fn from_f64_floor(x: f64) -> Option<Amount> {
        if !x.is_finite() || x < 0.0 {
            return None;
        }
        if x < 1.0 {
            return Some(Self::ZERO);
        }
        let bits = x.to_bits();
        let exponent = ((bits >> 52) & 0x7ff) as i32 - 1075;
        let mantissa = (bits & ((1u64 << 52) - 1)) | (1u64 << 52);
        if exponent >= 0 {
            // 53 significant bits shifted past bit 255 overflow.
            if exponent > 256 - 53 {
                return None;
            }
            Some(Self(U256::from(mantissa) << exponent as usize))
        } else {
            Some(Self::from_u64(mantissa >> (-exponent) as u32))
        }
    }
}

impl From<u64> for Amount {
    fn from(v: u64) -> Self {
        Self::from_u64(v)
    }
}

impl From<u128> for Amount {
    fn from(v: u128) -> Self {
        Self(U256::from(v))
    }
}

impl From<U256> for Amount {
    fn from(v: U256) -> Self {
        Self(v)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid amount {0:?}")]
pub struct ParseAmountError(String);

impl FromStr for Amount {
    type Err = ParseAmountError;

    /// Decimal, or hex with a `0x` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = match s.strip_prefix("0x") {
            Some(hex) => U256::from_str_radix(hex, 16).ok(),
            None => U256::from_dec_str(s).ok(),
        };
        parsed.map(Self).ok_or_else(|| ParseAmountError(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Comparisons and operators against u64
// ---------------------------------------------------------------------------

impl PartialEq<u64> for Amount {
    fn eq(&self, other: &u64) -> bool {
        *self == Amount::from(*other)
    }
}

impl PartialEq<Amount> for u64 {
    fn eq(&self, other: &Amount) -> bool {
        Amount::from(*self) == *other
    }
}

impl PartialOrd<u64> for Amount {
    fn partial_cmp(&self, other: &u64) -> Option<std::cmp::Ordering> {
        Some(self.cmp(&Amount::from(*other)))
    }
}

macro_rules! impl_ops {
    ($rhs:ty) => {
        impl Add<$rhs> for Amount {
            type Output = Amount;

            fn add(self, rhs: $rhs) -> Amount {
                Self(self.0 + Amount::from(rhs).0)
            }
        }

        impl Sub<$rhs> for Amount {
            type Output = Amount;

            fn sub(self, rhs: $rhs) -> Amount {
                Self(self.0 - Amount::from(rhs).0)
            }
        }

        impl AddAssign<$rhs> for Amount {
            fn add_assign(&mut self, rhs: $rhs) {
                *self = *self + rhs;
            }
        }

        impl SubAssign<$rhs> for Amount {
            fn sub_assign(&mut self, rhs: $rhs) {
                *self = *self - rhs;
            }
        }
    };
}

impl_ops!(Amount);
impl_ops!(u64);

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

// ---------------------------------------------------------------------------
// Serde
// ---------------------------------------------------------------------------

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            let mut bytes = [0u8; 32];
            self.0.to_big_endian(&mut bytes);
            hex_bytes::serialize(&bytes, serializer)
        }
    }
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a non-negative integer or a decimal string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        Ok(Amount::from(v))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<Amount, E> {
        Ok(Amount::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        u64::try_from(v)
            .map(Amount::from)
            .map_err(|_| E::custom(format!("negative amount {}", v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        v.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(AmountVisitor)
        } else {
            let bytes: [u8; 32] = hex_bytes::deserialize(deserializer)?;
            Ok(Self(U256::from_big_endian(&bytes)))
        }
    }
}
