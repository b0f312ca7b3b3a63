//! Fixed-point token amounts stored as VarUInteger 16

use crate::tlb::Tlb;
use crate::tvm::{Builder, CellError, Result, Slice};
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Decimal places of TON itself
pub const TON_DECIMALS: u32 = 9;

/// Largest supported number of decimal places (exclusive)
const MAX_DECIMALS: u32 = 128;

/// Amounts must fit in fewer than this many bytes
const MAX_NANO_BYTES: u64 = 16;

pub static ZERO_COINS: LazyLock<Coins> = LazyLock::new(|| Coins::from_nano_ton(0));

/// An amount in the smallest unit together with its number of decimal places
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coins {
    decimals: u32,
    nano: BigUint,
}

impl Coins {
    /// Parses a decimal string such as `"7.518"` with the given precision
    ///
    /// Fractional digits beyond `decimals` are truncated.
    pub fn from_decimal(value: &str, decimals: u32) -> Result<Self> {
        if decimals >= MAX_DECIMALS {
            return Err(CellError::InvalidArgument(format!(
                "invalid decimals {decimals}"
            )));
        }

        let (int_part, frac_part) = match value.split_once('.') {
            Some((int_part, frac_part)) => (int_part, Some(frac_part)),
            None => (value, None),
        };
        if !is_digits(int_part) || frac_part.is_some_and(|frac| !is_digits(frac)) {
            return Err(CellError::InvalidArgument(format!(
                "invalid amount string {value:?}"
            )));
        }

        let scale = BigUint::from(10u32).pow(decimals);
        let mut nano = parse_digits(int_part)? * &scale;

        if let Some(frac) = frac_part {
            let kept = &frac[..frac.len().min(decimals as usize)];
            if !kept.is_empty() {
                let padding = decimals as usize - kept.len();
                nano += parse_digits(kept)? * BigUint::from(10u32).pow(padding as u32);
            }
        }

        Self::from_nano(nano, decimals)
    }

    /// Parses a TON amount (9 decimals)
    pub fn from_ton(value: &str) -> Result<Self> {
        Self::from_decimal(value, TON_DECIMALS)
    }

    /// Wraps an amount already expressed in the smallest unit
    pub fn from_nano(nano: BigUint, decimals: u32) -> Result<Self> {
        if nano.bits().div_ceil(8) >= MAX_NANO_BYTES {
            return Err(CellError::ValueOutOfRange(format!(
                "amount {nano} does not fit in coins"
            )));
        }
        Ok(Self { decimals, nano })
    }

    pub fn from_nano_ton(nano: u64) -> Self {
        Self {
            decimals: TON_DECIMALS,
            nano: BigUint::from(nano),
        }
    }

    /// Parses a nanoton amount written as a plain decimal integer
    pub fn from_nano_str(value: &str) -> Result<Self> {
        if !is_digits(value) {
            return Err(CellError::InvalidArgument(format!(
                "invalid nano amount {value:?}"
            )));
        }
        Self::from_nano(parse_digits(value)?, TON_DECIMALS)
    }

    pub fn nano(&self) -> &BigUint {
        &self.nano
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub fn is_zero(&self) -> bool {
        self.nano.is_zero()
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_digits(s: &str) -> Result<BigUint> {
    BigUint::parse_bytes(s.as_bytes(), 10)
        .ok_or_else(|| CellError::InvalidArgument(format!("invalid digits {s:?}")))
}

impl Default for Coins {
    fn default() -> Self {
        ZERO_COINS.clone()
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.nano.to_str_radix(10);
        let decimals = self.decimals as usize;
        if self.nano.is_zero() || decimals == 0 {
            return f.write_str(&digits);
        }

        let (int_part, frac_part) = if digits.len() > decimals {
            let (hi, lo) = digits.split_at(digits.len() - decimals);
            (hi.to_string(), lo.to_string())
        } else {
            ("0".to_string(), format!("{digits:0>decimals$}"))
        };

        let frac_part = frac_part.trim_end_matches('0');
        if frac_part.is_empty() {
            f.write_str(&int_part)
        } else {
            write!(f, "{int_part}.{frac_part}")
        }
    }
}

impl FromStr for Coins {
    type Err = CellError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_ton(s)
    }
}

/// Amounts with different precision are not comparable
impl PartialOrd for Coins {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.decimals != other.decimals {
            return None;
        }
        Some(self.nano.cmp(&other.nano))
    }
}

impl Serialize for Coins {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.nano.to_str_radix(10))
    }
}

impl<'de> Deserialize<'de> for Coins {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Coins::from_nano_str(&s).map_err(serde::de::Error::custom)
    }
}

impl Tlb for Coins {
    fn store(&self, builder: &mut Builder) -> Result<()> {
        builder.store_big_coins(&self.nano)?;
        Ok(())
    }

    fn load(slice: &mut Slice) -> Result<Self> {
        Ok(Self {
            decimals: TON_DECIMALS,
            nano: slice.load_big_coins()?,
        })
    }
}
