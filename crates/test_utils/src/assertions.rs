//! Custom Test Assertions
//!
//! Assertion helpers for deposit schedules and positions that give more
//! meaningful failure messages than plain `assert_eq!`.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use core_kernel::{first_of_month, is_first_of_month};
use domain_deposit::{Deposit, SavingsAccount};
use domain_holding::{replay_lots, Lot, Position};

/// Asserts that a deposit's watermark is a first-of-month no later than
/// `today`'s month or the maturity month, whichever comes first
pub fn assert_watermark_valid(deposit: &Deposit, today: NaiveDate) {
    if let Some(period) = deposit.last_processed_period {
        assert!(
            is_first_of_month(period),
            "Watermark {} of deposit {} is not the first of a month",
            period,
            deposit.id
        );
        let ceiling = first_of_month(today.min(deposit.maturity_date));
        assert!(
            period <= ceiling,
            "Watermark {} of deposit {} is after the last chargeable period {}",
            period,
            deposit.id,
            ceiling
        );
    }
}

/// Asserts that a deposit has been charged through the given month
pub fn assert_processed_through(deposit: &Deposit, period: NaiveDate) {
    assert_eq!(
        deposit.last_processed_period,
        Some(first_of_month(period)),
        "Deposit {} is not processed through {}",
        deposit.id,
        period
    );
}

/// Asserts that `after` is `before` less `installments` installments of `deposit`
pub fn assert_charged(before: &SavingsAccount, after: &SavingsAccount, deposit: &Deposit, installments: u32) {
    let expected = before.balance - deposit.amount * Decimal::from(installments);
    assert_eq!(
        after.balance, expected,
        "Account {} should hold {} after {} installments of {}, holds {}",
        after.id, expected, installments, deposit.amount, after.balance
    );
}

/// Asserts that a value carries at most two decimal places
pub fn assert_cents(value: Decimal) {
    assert!(
        value.scale() <= 2,
        "{} has more than two decimal places (scale={})",
        value,
        value.scale()
    );
}

/// Asserts that replaying the lot log reproduces the position
pub fn assert_replay_matches(position: &Position, lots: &[Lot]) {
    let replayed = match replay_lots(lots) {
        Ok(holding) => holding,
        Err(e) => panic!("Lot log of position {} cannot be replayed: {}", position.id, e),
    };
    assert_eq!(
        replayed,
        position.holding(),
        "Lot log of position {} replays to {:?}, position holds {:?}",
        position.id,
        replayed,
        position.holding()
    );
}

/// Asserts that a result is Ok and returns the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Asserts that an error matches a specific variant
#[macro_export]
macro_rules! assert_err_variant {
    ($result:expr, $pattern:pat) => {
        match $result {
            Ok(value) => panic!("Expected Err matching {}, got Ok({:?})", stringify!($pattern), value),
            Err(ref e) => {
                assert!(
                    matches!(e, $pattern),
                    "Error {:?} does not match pattern {}",
                    e,
                    stringify!($pattern)
                );
            }
        }
    };
}
