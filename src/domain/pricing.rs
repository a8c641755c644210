//! Dual-currency price display and discount percentage.
//!
//! Catalog prices are stored in leva. Every surface shows the leva amount
//! and its euro equivalent at [`BGN_PER_EUR`], and every surface computes the
//! "-N%" badge through [`percent_off`] so listing and detail pages agree.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::domain::value_objects::{Money, BGN_PER_EUR};

/// Formats a leva amount as euros with two decimals.
///
/// Non-finite input formats as `0.00`.
pub fn to_secondary_currency(amount: f64) -> String {
    let Some(amount) = Decimal::from_f64(amount).filter(|_| amount.is_finite()) else {
        return "0.00".to_string();
    };
    format!("{:.2}", (amount / BGN_PER_EUR).round_dp(2))
}

/// Whole-percent discount of `price` against `compare_price`.
///
/// Zero unless `compare_price` is present and strictly greater than `price`.
pub fn percent_off(price: Decimal, compare_price: Option<Decimal>) -> u32 {
    let Some(compare) = compare_price else { return 0 };
    if compare <= price || compare <= Decimal::ZERO {
        return 0;
    }
    let ratio = Decimal::ONE_HUNDRED * (Decimal::ONE - price / compare);
    ratio
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u32()
        .unwrap_or(0)
}

/// A price rendered in both currencies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PriceDisplay {
    pub primary: String,
    pub secondary: String,
}

impl PriceDisplay {
    pub fn of(amount: Decimal) -> Self {
        let money = Money::bgn(amount);
        Self { primary: money.to_string(), secondary: money.to_eur().to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secondary_currency_uses_fixed_rate() {
        assert_eq!(to_secondary_currency(58.70), "30.01");
        assert_eq!(to_secondary_currency(0.0), "0.00");
        assert_eq!(to_secondary_currency(195.583), "100.00");
    }

    #[test]
    fn secondary_currency_tolerates_non_finite_input() {
        assert_eq!(to_secondary_currency(f64::NAN), "0.00");
        assert_eq!(to_secondary_currency(f64::INFINITY), "0.00");
    }

    #[test]
    fn percent_off_rounds_to_nearest_whole_percent() {
        assert_eq!(percent_off(Decimal::new(4990, 2), Some(Decimal::new(5990, 2))), 17);
        assert_eq!(percent_off(Decimal::new(50, 0), Some(Decimal::new(100, 0))), 50);
    }

    #[test]
    fn percent_off_is_zero_without_a_higher_compare_price() {
        let price = Decimal::new(4990, 2);
        assert_eq!(percent_off(price, None), 0);
        assert_eq!(percent_off(price, Some(price)), 0);
        assert_eq!(percent_off(price, Some(Decimal::new(3000, 2))), 0);
    }

    #[test]
    fn price_display_shows_both_currencies() {
        let display = PriceDisplay::of(Decimal::new(17610, 2));
        assert_eq!(display.primary, "176.10 лв.");
        assert_eq!(display.secondary, "90.04 €");
    }
}
