//! Type-safe price representation using decimal arithmetic.
//!
//! The backend serializes `DecimalField` values as strings (`"12.50"`), while
//! older local cart entries may hold plain JSON numbers. [`Price::from_json`]
//! accepts both and falls back to zero, matching how the storefront treats
//! an unreadable price.

use core::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A store price in the shop's single currency (USD).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Zero price.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from an integer number of cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// Underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Coerce a loosely-typed JSON value into a price.
    ///
    /// Strings and numbers are parsed; anything else (including
    /// unparseable or negative input) yields zero.
    #[must_use]
    pub fn from_json(value: Option<&serde_json::Value>) -> Self {
        let parsed = match value {
            Some(serde_json::Value::String(s)) => Decimal::from_str(s.trim()).ok(),
            Some(serde_json::Value::Number(n)) => n
                .as_i64()
                .map(Decimal::from)
                .or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok())),
            _ => None,
        };

        parsed
            .filter(|d| !d.is_sign_negative())
            .map_or(Self::ZERO, Self)
    }

    /// Price multiplied by a quantity.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// Percentage of this price, rounded to cents.
    #[must_use]
    pub fn percent(&self, percent: u32) -> Self {
        Self((self.0 * Decimal::from(percent) / Decimal::ONE_HUNDRED).round_dp(2))
    }
}

impl core::ops::Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl core::iter::Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, p| acc + p)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}
