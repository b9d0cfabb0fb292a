//! Repository implementations for domain entities
//!
//! Repositories encapsulate SQL queries and work on plain row types;
//! the adapters map those rows to domain types.
//!
//! Every repository follows these rules:
//! - Updates carry the version that was read and fail when it moved on
//! - Writes that touch more than one row run in one transaction

pub mod deposit;
pub mod holding;

pub use deposit::{AccountRow, DepositRepository, DepositRow};
pub use holding::{HoldingRepository, LotRow, PositionRow};
