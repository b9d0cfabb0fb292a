//! Deposit Domain - Recurring Deposits and Savings Accounts
//!
//! This crate manages fixed and recurring deposits and the savings accounts
//! recurring deposits draw from. Its core is the catch-up deduction rule:
//! every calendar month between a deposit's watermark and the current month
//! is charged to the linked account in one batch.
//!
//! # Deposits
//!
//! - **Fixed (FD)**: a principal held until maturity, nothing is scheduled
//! - **Recurring (RD)**: one installment per calendar month, charged to a
//!   linked savings account until the maturity month
//!
//! # Reconciliation
//!
//! Deductions are triggered when a user's deposits are listed and by the
//! batch sweep. Both paths call [`reconcile`] and store the result with
//! [`DepositPort::commit_deduction`], which writes the deposit and the account
//! together or not at all.
//!
//! # Cash flow
//!
//! Expenses paid from a savings account debit it when recorded and credit
//! it back when deleted. Income entries are kept for reporting only.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_deposit::{DepositService, MockDepositPort};
//! use std::sync::Arc;
//!
//! let service = DepositService::new(Arc::new(MockDepositPort::new()));
//! let overview = service.list_deposits(user_id, today).await?;
//! for summary in &overview.applied {
//!     println!("{} installments charged to {}", summary.installments, summary.account_id);
//! }
//! ```

pub mod deposit;
pub mod account;
pub mod cashflow;
pub mod schedule;
pub mod opening;
pub mod ports;
pub mod services;
pub mod error;

pub use deposit::{Deposit, DepositKind, CreateDeposit, DepositChanges};
pub use account::{SavingsAccount, OpenAccount, AccountChanges};
pub use cashflow::{Expense, RecordExpense, Income, RecordIncome};
pub use schedule::{reconcile, DeductionBatch, Reconciliation};
pub use opening::{open_deposit, Opening};
pub use ports::DepositPort;
#[cfg(any(test, feature = "mock"))]
pub use ports::mock::MockDepositPort;
pub use services::{
    DepositService, DepositServiceSettings, MissingAccountPolicy,
    DepositOverview, DeductionSummary, DeductionIssue, SweepReport,
};
pub use error::DepositError;
