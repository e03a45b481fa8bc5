use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{ModelError, ModelResult};

/// Exact decimal quantity of coins or hours.
///
/// Two amounts are equal when their decimal values are equal, so `"1.0"` and
/// `"1"` parse to equal amounts. Deltas may be negative; operations that
/// produce balances go through [`Amount::sub_non_negative`] or check
/// [`Amount::is_negative`] themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    /// Parse a decimal string, rejecting values with more fractional digits
    /// than `precision` allows.
    pub fn parse_with(s: &str, precision: Precision) -> ModelResult<Self> {
        let amount = s.parse::<Amount>()?;
        amount.check_precision(precision).map_err(|_| {
            ModelError::parse(
                s,
                format!("more than {} decimal places", precision.decimals()),
            )
        })?;
        Ok(amount)
    }

    pub fn check_precision(&self, precision: Precision) -> ModelResult<()> {
        let scale = self.0.normalize().scale();
        if scale > precision.decimals() {
            return Err(ModelError::InvariantViolation(format!(
                "{self} exceeds {} decimal places",
                precision.decimals()
            )));
        }
        Ok(())
    }

    pub fn checked_add(self, other: Amount) -> ModelResult<Amount> {
        self.0
            .checked_add(other.0)
            .map(Amount)
            .ok_or_else(|| ModelError::Overflow(format!("{self} + {other}")))
    }

    pub fn checked_sub(self, other: Amount) -> ModelResult<Amount> {
        self.0
            .checked_sub(other.0)
            .map(Amount)
            .ok_or_else(|| ModelError::Overflow(format!("{self} - {other}")))
    }

    /// Subtract where the result must stay a valid balance.
    pub fn sub_non_negative(self, other: Amount) -> ModelResult<Amount> {
        let result = self.checked_sub(other)?;
        if result.is_negative() {
            return Err(ModelError::InvariantViolation(format!(
                "{self} - {other} is negative"
            )));
        }
        Ok(result)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        !self.0.is_zero() && self.0.is_sign_negative()
    }

    pub fn abs(self) -> Amount {
        Amount(self.0.abs())
    }

    /// Exact sum; fails only on overflow.
    pub fn try_sum<I>(amounts: I) -> ModelResult<Amount>
    where
        I: IntoIterator<Item = Amount>,
    {
        amounts
            .into_iter()
            .try_fold(Amount::ZERO, |acc, amount| acc.checked_add(amount))
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl FromStr for Amount {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix('-').unwrap_or(s);
        let (whole, fraction) = match digits.split_once('.') {
            Some((whole, fraction)) => (whole, Some(fraction)),
            None => (digits, None),
        };

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ModelError::parse(s, "expected decimal digits"));
        }
        if let Some(fraction) = fraction {
            if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ModelError::parse(s, "expected digits after decimal point"));
            }
        }

        Decimal::from_str_exact(s)
            .map(Amount)
            .map_err(|e| ModelError::parse(s, e.to_string()))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_zero() {
            return f.write_str("0");
        }
        write!(f, "{}", self.0.normalize())
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Amount(Decimal::from(value))
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Amount(Decimal::from(value))
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount(value)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct AmountVisitor;

impl Visitor<'_> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a decimal string or an integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        Ok(Amount::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        Ok(Amount::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
        Err(E::custom(format!(
            "floating point amount {v} is not accepted, send a decimal string"
        )))
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

/// Number of decimal places a resource may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precision(u32);

impl Precision {
    pub const MAX_DECIMALS: u32 = 18;

    pub fn new(decimals: u32) -> ModelResult<Self> {
        if decimals > Self::MAX_DECIMALS {
            return Err(ModelError::InvariantViolation(format!(
                "precision of {decimals} decimals exceeds {}",
                Self::MAX_DECIMALS
            )));
        }
        Ok(Precision(decimals))
    }

    pub fn decimals(&self) -> u32 {
        self.0
    }
}

/// Precision rules for both resources of the currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Denomination {
    pub coins: Precision,
    pub hours: Precision,
}

impl Default for Denomination {
    fn default() -> Self {
        Denomination {
            coins: Precision(6),
            hours: Precision(0),
        }
    }
}
