//! Core Kernel - Foundational types and utilities for the wealth tracker
//!
//! This crate provides the building blocks shared by the deposit and holding
//! domains:
//! - Decimal rounding helpers with an explicit half-up rule
//! - Calendar-month arithmetic used by the deduction schedule
//! - Strongly-typed identifiers
//! - Port error types for store adapters

pub mod money;
pub mod calendar;
pub mod identifiers;
pub mod ports;

pub use money::{MoneyError, CURRENCY_PRECISION, round_half_up, round_currency, checked_scale};
pub use calendar::{
    CalendarError, Timezone, first_of_month, is_first_of_month, months_between, next_period,
};
pub use identifiers::{
    IdParseError, UserId, DepositId, AccountId, ExpenseId, IncomeId, PositionId, LotId,
};
pub use ports::{PortError, DomainPort, ConflictRetry};
