//! Fixed-point arithmetic and mathematical utilities.
//!
//! `Decimal` is a non-negative rational stored as an integer numerator over a
//! fixed scale of 10^18. Every operation is checked: intermediate products are
//! carried in 256 bits and the result is narrowed back, so nothing wraps
//! silently. Conversions to plain integers truncate toward zero.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use crate::error::{Error, Result};
use crate::utils::constants::{BPS_DIVISOR, DECIMAL_PLACES, WAD};

mod wide {
    use uint::construct_uint;

    construct_uint! {
        /// 256-bit unsigned integer for intermediate products.
        pub struct U256(4);
    }
}
pub use wide::U256;

// ═══════════════════════════════════════════════════════════════════════════════
// DECIMAL TYPE
// ═══════════════════════════════════════════════════════════════════════════════

/// Fixed-point number with 18 decimal places precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Decimal(u128);

impl Decimal {
    /// Scale factor: 10^18
    pub const SCALE: u128 = WAD;

    /// Zero value
    pub const ZERO: Self = Self(0);

    /// One (1.0)
    pub const ONE: Self = Self(WAD);

    /// Create a new Decimal from its raw scaled value
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Get the raw underlying value
    pub const fn raw(&self) -> u128 {
        self.0
    }

    /// One (1.0)
    pub fn one() -> Self {
        Self::ONE
    }

    /// Zero
    pub fn zero() -> Self {
        Self::ZERO
    }

    /// Create from an integer (scales up)
    pub fn from_integer(value: u128) -> Result<Self> {
        value
            .checked_mul(WAD)
            .map(Self)
            .ok_or_else(|| Error::arithmetic("decimal-from-integer"))
    }

    /// Create from basis points (100 bps = 1%)
    pub fn from_bps(bps: u64) -> Self {
        Self(bps as u128 * WAD / BPS_DIVISOR as u128)
    }

    /// `numerator / denominator` as a Decimal
    pub fn ratio(numerator: u128, denominator: u128) -> Result<Self> {
        mul_div_floor(numerator, WAD, denominator).map(Self)
    }

    /// Check if value is zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn try_add(self, rhs: Self) -> Result<Self> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or_else(|| Error::arithmetic("decimal-add"))
    }

    /// Checked subtraction, fails below zero
    pub fn try_sub(self, rhs: Self) -> Result<Self> {
        self.0
            .checked_sub(rhs.0)
            .map(Self)
            .ok_or_else(|| Error::arithmetic("decimal-sub"))
    }

    /// Subtraction floored at zero
    pub fn sub_or_zero(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// Checked multiplication, truncating the 19th decimal place
    pub fn try_mul(self, rhs: Self) -> Result<Self> {
        mul_div_floor(self.0, rhs.0, WAD).map(Self)
    }

    /// Checked division, truncating toward zero
    pub fn try_div(self, rhs: Self) -> Result<Self> {
        mul_div_floor(self.0, WAD, rhs.0).map(Self)
    }

    /// Minimum of two values
    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    /// Maximum of two values
    pub fn max(self, other: Self) -> Self {
        Self(self.0.max(other.0))
    }

    /// Bound to `[low, high]`; `high` wins when the bounds cross
    pub fn clamp(self, low: Self, high: Self) -> Self {
        self.max(low).min(high)
    }

    /// Multiply a raw integer amount, truncating the result
    pub fn mul_amount(self, amount: u128) -> Result<u128> {
        mul_div_floor(amount, self.0, WAD)
    }

    /// Convert to an integer, rounding down (truncating)
    pub fn to_integer_floor(&self) -> u128 {
        self.0 / WAD
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:0width$}",
            self.0 / WAD,
            self.0 % WAD,
            width = DECIMAL_PLACES as usize
        )
    }
}

impl FromStr for Decimal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidParameter {
            name: "decimal",
            reason: format!("{reason}: {s:?}"),
        };

        let s = s.trim();
        let (whole, frac) = match s.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (s, ""),
        };

        if whole.is_empty() && frac.is_empty() {
            return Err(invalid("empty value"));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("not a non-negative decimal"));
        }
        if frac.len() > DECIMAL_PLACES as usize {
            return Err(invalid("more than 18 decimal places"));
        }

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("integer part out of range"))?
        };
        let frac_raw: u128 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{frac:0<width$}", width = DECIMAL_PLACES as usize);
            padded.parse().map_err(|_| invalid("fraction out of range"))?
        };

        Self::from_integer(whole)?.try_add(Self(frac_raw))
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            serializer.serialize_u128(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let text = String::deserialize(deserializer)?;
            text.parse().map_err(serde::de::Error::custom)
        } else {
            u128::deserialize(deserializer).map(Self)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SAFE ARITHMETIC OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Safe addition with overflow check
pub fn safe_add(a: u128, b: u128) -> Result<u128> {
    a.checked_add(b).ok_or_else(|| Error::arithmetic("amount-add"))
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: u128, b: u128) -> Result<u128> {
    a.checked_sub(b).ok_or_else(|| Error::arithmetic("amount-sub"))
}

/// Safe multiplication with overflow check
pub fn safe_mul(a: u128, b: u128) -> Result<u128> {
    a.checked_mul(b).ok_or_else(|| Error::arithmetic("amount-mul"))
}

/// Computes `(a * b) / c` with a 256-bit intermediate, rounding down
pub fn mul_div_floor(a: u128, b: u128, c: u128) -> Result<u128> {
    if c == 0 {
        return Err(Error::arithmetic("division-by-zero"));
    }
    let quotient = U256::from(a) * U256::from(b) / U256::from(c);
    narrow(quotient, "mul-div")
}

/// Computes `(a * b) / c` with a 256-bit intermediate, rounding up
pub fn mul_div_ceil(a: u128, b: u128, c: u128) -> Result<u128> {
    if c == 0 {
        return Err(Error::arithmetic("division-by-zero"));
    }
    let product = U256::from(a) * U256::from(b);
    let divisor = U256::from(c);
    let mut quotient = product / divisor;
    if !(product % divisor).is_zero() {
        quotient = quotient + U256::one();
    }
    narrow(quotient, "mul-div")
}

/// Narrow a 256-bit value back into `u128`
pub fn narrow(value: U256, operation: &'static str) -> Result<u128> {
    if value > U256::from(u128::MAX) {
        return Err(Error::arithmetic(operation));
    }
    Ok(value.low_u128())
}

/// Serde adapter storing a `U256` as its four little-endian limbs
pub mod u256_serde {
    use super::U256;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize the limbs
    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        value.0.serialize(serializer)
    }

    /// Deserialize the limbs
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        <[u64; 4]>::deserialize(deserializer).map(U256)
    }
}
