//! Pre-built Test Fixtures
//!
//! Ready-to-use dates, amounts and identifiers shared across the deposit and
//! holding test suites. Values are fixed so scenarios stay predictable.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use core_kernel::{AccountId, UserId};

/// Fixture for calendar dates
pub struct DateFixtures;

impl DateFixtures {
    /// First scheduled month of the standard recurring deposit (Jan 1, 2024)
    pub fn schedule_start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    /// Mid-April 2024: four installments due for a January start
    pub fn four_months_in() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 15).unwrap()
    }

    /// Maturity far enough away that it never caps a scenario
    pub fn distant_maturity() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()
    }

    /// Maturity in March 2024
    pub fn march_maturity() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    /// Leap day, for month arithmetic edge cases
    pub fn leap_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
    }
}

/// Fixture for decimal amounts
pub struct AmountFixtures;

impl AmountFixtures {
    /// Monthly installment of the standard recurring deposit
    pub fn installment() -> Decimal {
        dec!(1500)
    }

    /// Opening balance of the standard savings account
    pub fn opening_balance() -> Decimal {
        dec!(100000)
    }

    /// Principal of the standard fixed deposit
    pub fn fixed_principal() -> Decimal {
        dec!(250000)
    }

    /// Standard deposit interest rate in percent
    pub fn interest_rate() -> Decimal {
        dec!(7.10)
    }
}

/// Fixture for identifiers
pub struct IdFixtures;

impl IdFixtures {
    /// Creates a deterministic user ID for testing
    pub fn user_id() -> UserId {
        UserId::from(Uuid::from_u128(0x550e8400_e29b_41d4_a716_446655440001))
    }

    /// A second deterministic user, for ownership tests
    pub fn other_user_id() -> UserId {
        UserId::from(Uuid::from_u128(0x550e8400_e29b_41d4_a716_446655440002))
    }

    /// An account ID that no store contains
    pub fn unknown_account_id() -> AccountId {
        AccountId::from(Uuid::from_u128(0x550e8400_e29b_41d4_a716_4466554400ff))
    }
}

/// Fixture for names
pub struct StringFixtures;

impl StringFixtures {
    pub fn bank_name() -> &'static str {
        "State Bank of India"
    }

    pub fn account_number() -> &'static str {
        "00001234567890"
    }

    pub fn stock_name() -> &'static str {
        "Infosys"
    }

    pub fn stock_symbol() -> &'static str {
        "INFY"
    }

    pub fn fund_name() -> &'static str {
        "Parag Parikh Flexi Cap Fund"
    }
}
