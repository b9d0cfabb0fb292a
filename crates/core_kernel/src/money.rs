//! Decimal helpers for monetary values
//!
//! Amounts are plain `rust_decimal::Decimal` values in a single, implicit
//! currency. This module fixes the rounding rule used everywhere a value is
//! quantised: round half up, i.e. midpoints move away from zero.

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Decimal places kept for prices, averaged costs and balances
pub const CURRENCY_PRECISION: u32 = 2;

/// Errors that can occur during amount arithmetic
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Overflow during calculation")]
    Overflow,
}

/// Rounds `value` to `dp` decimal places, midpoints away from zero
///
/// # Example
///
/// ```rust
/// use core_kernel::round_half_up;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(round_half_up(dec!(1.005), 2), dec!(1.01));
/// assert_eq!(round_half_up(dec!(-1.005), 2), dec!(-1.01));
/// ```
pub fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds to [`CURRENCY_PRECISION`] using [`round_half_up`]
pub fn round_currency(value: Decimal) -> Decimal {
    round_half_up(value, CURRENCY_PRECISION)
}

/// Multiplies an amount by a whole count, failing instead of panicking on overflow
///
/// # Arguments
///
/// * `amount` - The per-unit amount (e.g. an installment)
/// * `count` - How many units to charge
pub fn checked_scale(amount: Decimal, count: u32) -> Result<Decimal, MoneyError> {
    amount
        .checked_mul(Decimal::from(count))
        .ok_or(MoneyError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_half_up_midpoint() {
        assert_eq!(round_half_up(dec!(2.345), 2), dec!(2.35));
        assert_eq!(round_half_up(dec!(2.344), 2), dec!(2.34));
    }

    #[test]
    fn test_round_currency_keeps_exact_values() {
        assert_eq!(round_currency(dec!(150)), dec!(150));
        assert_eq!(round_currency(dec!(42.337)), dec!(42.34));
    }

    #[test]
    fn test_checked_scale() {
        assert_eq!(checked_scale(dec!(500), 4), Ok(dec!(2000)));
        assert_eq!(checked_scale(dec!(500), 0), Ok(dec!(0)));
        assert_eq!(checked_scale(Decimal::MAX, 2), Err(MoneyError::Overflow));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn rounding_moves_at_most_half_a_cent(minor in -1_000_000_000i64..1_000_000_000i64) {
            let value = Decimal::new(minor, 4);
            let rounded = round_currency(value);
            prop_assert!((rounded - value).abs() <= Decimal::new(5, 3));
            prop_assert!(rounded.scale() <= CURRENCY_PRECISION);
        }

        #[test]
        fn rounding_is_symmetric_around_zero(minor in 0i64..1_000_000_000i64) {
            let value = Decimal::new(minor, 3);
            prop_assert_eq!(round_currency(-value), -round_currency(value));
        }
    }
}
