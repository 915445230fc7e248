//! Money amounts.

use serde::{Deserialize, Serialize};

/// A USD amount represented in cents to avoid floating point issues.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money {
    cents: i64,
}

impl Money {
    /// Smallest amount the simple offer form accepts ($1.00).
    pub const MIN_SIMPLE_OFFER: Money = Money { cents: 100 };

    /// Highest price a listing may ask ($1,000,000,000.00).
    pub const MAX_PRICE: Money = Money {
        cents: 100_000_000_000,
    };

    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    pub fn from_dollars(dollars: i64) -> Self {
        Self {
            cents: dollars * 100,
        }
    }

    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the dollar portion (whole number).
    pub fn dollars(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after dollars).
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// The floor applied to offers on a listing that has no explicit
    /// minimum: 80% of the price, rounded up to the next cent.
    pub fn default_minimum_offer(price: Money) -> Money {
        // ceil(4c / 5) == c - floor(c / 5), without the overflowing 4c.
        Money::from_cents(price.cents - price.cents.div_euclid(5))
    }

    /// Decimal dollar string as payment providers expect it, e.g. `"1000.00"`.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.cents < 0 { "-" } else { "" };
        format!("{sign}{}.{:02}", self.dollars().abs(), self.cents_part())
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}", self.to_decimal_string())
    }
}
