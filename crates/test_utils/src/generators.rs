//! Property-Based Test Generators
//!
//! Proptest strategies for amounts, calendar dates and purchase lots that
//! respect the domain's input rules.

use chrono::{Datelike, Months, NaiveDate};
use proptest::prelude::*;
use rust_decimal::Decimal;

use domain_holding::IncomingLot;

/// Strategy for monthly installments between 1.00 and 100000.00
pub fn installment_strategy() -> impl Strategy<Value = Decimal> {
    (100i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for any day between January 2000 and December 2039
pub fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (2000i32..2040i32, 1u32..=12u32, 1u32..=28u32, 0u32..4u32).prop_map(|(y, m, d, extra)| {
        let base = NaiveDate::from_ymd_opt(y, m, d).unwrap();
        // 29th to 31st where the month has them
        NaiveDate::from_ymd_opt(y, m, d + extra).unwrap_or(base)
    })
}

/// Strategy for the first day of a month between 2000 and 2039
pub fn period_strategy() -> impl Strategy<Value = NaiveDate> {
    (2000i32..2040i32, 1u32..=12u32).prop_map(|(y, m)| NaiveDate::from_ymd_opt(y, m, 1).unwrap())
}

/// Strategy for a start date followed by a later "today" up to `max_months` on
pub fn schedule_strategy(max_months: u32) -> impl Strategy<Value = (NaiveDate, NaiveDate)> {
    (date_strategy(), 0u32..=max_months, 1u32..=28u32).prop_map(|(start, months, day)| {
        let later = start + Months::new(months);
        let today = later.with_day(day).unwrap_or(later).max(start);
        (start, today)
    })
}

/// Strategy for lot quantities: positive, up to three decimal places
pub fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|n| Decimal::new(n, 3))
}

/// Strategy for unit costs: non-negative, up to four decimal places
pub fn unit_cost_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..100_000_000i64).prop_map(|n| Decimal::new(n, 4))
}

/// Strategy for valid incoming lots
pub fn incoming_lot_strategy() -> impl Strategy<Value = IncomingLot> {
    (quantity_strategy(), unit_cost_strategy())
        .prop_map(|(quantity, unit_cost)| IncomingLot::new(quantity, unit_cost))
}

/// Strategy for a non-empty sequence of valid lots
pub fn lot_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<IncomingLot>> {
    proptest::collection::vec(incoming_lot_strategy(), 1..=max_len.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::is_first_of_month;

    proptest! {
        #[test]
        fn periods_are_first_of_month(period in period_strategy()) {
            prop_assert!(is_first_of_month(period));
        }

        #[test]
        fn schedules_never_go_backwards((start, today) in schedule_strategy(48)) {
            prop_assert!(today >= start);
        }

        #[test]
        fn lots_are_valid(lot in incoming_lot_strategy()) {
            prop_assert!(lot.quantity > Decimal::ZERO);
            prop_assert!(lot.unit_cost >= Decimal::ZERO);
        }
    }
}
