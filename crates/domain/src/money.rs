//! Monetary amounts.

use serde::{Deserialize, Serialize};

/// Money amount represented in cents to avoid floating point issues.
///
/// Serialized as a bare integer number of cents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money {
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a new Money amount from a whole dollar value.
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

    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Returns `percent`% of this amount, rounded down to the cent.
    pub fn percent(&self, percent: i64) -> Self {
        Self {
            cents: self.cents * percent / 100,
        }
    }

    /// Returns `part` as a percentage of this amount, or 0 when this is zero.
    pub fn ratio_percent(&self, part: Money) -> f64 {
        if self.cents == 0 {
            0.0
        } else {
            part.cents as f64 / self.cents as f64 * 100.0
        }
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.cents.checked_add(other.cents).map(Money::from_cents)
    }
}

impl std::ops::Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            cents: self.cents + other.cents,
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            cents: self.cents - other.cents,
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, other: Self) {
        self.cents += other.cents;
    }
}

/// Formats as dollars with thousands separators, e.g. `$950,000.00`.
impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let digits = (self.cents.unsigned_abs() / 100).to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        write!(f, "{sign}${grouped}.{:02}", self.cents_part())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_groups_thousands() {
        assert_eq!(Money::from_dollars(950_000).to_string(), "$950,000.00");
        assert_eq!(Money::from_cents(123_456_789).to_string(), "$1,234,567.89");
        assert_eq!(Money::from_cents(1234).to_string(), "$12.34");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::from_dollars(100).to_string(), "$100.00");
    }

    #[test]
    fn display_negative() {
        assert_eq!(Money::from_cents(-150_050).to_string(), "-$1,500.50");
    }

    #[test]
    fn serializes_as_cents() {
        let json = serde_json::to_value(Money::from_dollars(12)).unwrap();
        assert_eq!(json, serde_json::json!(1200));
        let back: Money = serde_json::from_value(json).unwrap();
        assert_eq!(back, Money::from_cents(1200));
    }

    #[test]
    fn percent_and_ratio() {
        let asking = Money::from_dollars(500_000);
        assert_eq!(asking.percent(80), Money::from_dollars(400_000));

        let target = Money::from_dollars(400_000);
        assert_eq!(target.ratio_percent(Money::from_dollars(100_000)), 25.0);
        assert_eq!(Money::zero().ratio_percent(Money::from_dollars(1)), 0.0);
    }

    #[test]
    fn arithmetic() {
        let mut total = Money::from_dollars(10);
        total += Money::from_cents(50);
        assert_eq!(total.cents(), 1050);
        assert_eq!((total - Money::from_dollars(1)).cents(), 950);
        assert!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)).is_none());
    }
}
