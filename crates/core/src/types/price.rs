//! Type-safe price representation using decimal arithmetic.
//!
//! Menu prices are stored by the backend as `numeric` ringgit amounts, so the
//! default currency is MYR and prices render as `RM 5.00`.

use core::fmt;
use core::iter::Sum;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., ringgit, not sen).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// A price in Malaysian ringgit.
    #[must_use]
    pub const fn myr(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::MYR)
    }

    /// A zero price in the default currency.
    #[must_use]
    pub const fn zero() -> Self {
        Self::myr(Decimal::ZERO)
    }

    /// Price of `quantity` units at this unit price.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self::new(self.amount * Decimal::from(quantity), self.currency_code)
    }

    /// Format for display (e.g., "RM 19.90").
    #[must_use]
    pub fn display(&self) -> String {
        format!("{} {:.2}", self.currency_code.symbol(), self.amount)
    }
}

impl Default for Price {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl Sum for Price {
    /// Sums amounts. Mixed currencies are not expected; the first price's
    /// currency wins.
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        let mut iter = iter.peekable();
        let currency_code = iter
            .peek()
            .map_or(CurrencyCode::default(), |p| p.currency_code);
        let amount = iter.map(|p| p.amount).sum();
        Self::new(amount, currency_code)
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    MYR,
    SGD,
    USD,
}

impl CurrencyCode {
    /// Display symbol.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::MYR => "RM",
            Self::SGD => "S$",
            Self::USD => "$",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_pads_to_two_places() {
        assert_eq!(Price::myr(Decimal::new(5, 0)).display(), "RM 5.00");
        assert_eq!(Price::myr(Decimal::new(1250, 2)).to_string(), "RM 12.50");
    }

    #[test]
    fn test_times_multiplies_amount() {
        let unit = Price::myr(Decimal::new(350, 2));
        assert_eq!(unit.times(3).amount, Decimal::new(1050, 2));
        assert_eq!(unit.times(0).amount, Decimal::ZERO);
    }

    #[test]
    fn test_sum_of_prices() {
        let total: Price = [Decimal::new(5, 0), Decimal::new(6, 0)]
            .into_iter()
            .map(Price::myr)
            .sum();
        assert_eq!(total.amount, Decimal::new(11, 0));
        assert_eq!(total.currency_code, CurrencyCode::MYR);
    }

    #[test]
    fn test_empty_sum_is_zero() {
        let total: Price = std::iter::empty::<Price>().sum();
        assert_eq!(total, Price::zero());
    }
}
