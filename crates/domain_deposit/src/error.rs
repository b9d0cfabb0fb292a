//! Deposit domain errors

use thiserror::Error;

use core_kernel::{CalendarError, MoneyError, PortError};

/// Errors that can occur in the deposit domain
#[derive(Debug, Error)]
pub enum DepositError {
    /// Deposit not found
    #[error("Deposit not found: {0}")]
    DepositNotFound(String),

    /// Savings account not found
    #[error("Savings account not found: {0}")]
    AccountNotFound(String),

    /// Expense not found
    #[error("Expense not found: {0}")]
    ExpenseNotFound(String),

    /// Income entry not found
    #[error("Income not found: {0}")]
    IncomeNotFound(String),

    /// The record belongs to another user
    #[error("{entity} {id} does not belong to the requesting user")]
    NotOwned {
        entity: &'static str,
        id: String,
    },

    /// Deposit data failed validation
    #[error("Invalid deposit: {0}")]
    InvalidDeposit(String),

    /// Account data failed validation
    #[error("Invalid savings account: {0}")]
    InvalidAccount(String),

    /// Expense or income data failed validation
    #[error("Invalid expense: {0}")]
    InvalidExpense(String),

    #[error("Invalid income: {0}")]
    InvalidIncome(String),

    /// A deposit references an account that cannot be resolved
    #[error("Linked savings account not found: {0}")]
    LinkedAccountNotFound(String),

    /// Calculation error
    #[error("Calculation error: {0}")]
    Calculation(String),

    /// Version conflicts persisted after every retry
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    /// Store failure
    #[error("Store error: {0}")]
    Port(#[from] PortError),
}

impl From<MoneyError> for DepositError {
    fn from(err: MoneyError) -> Self {
        DepositError::Calculation(err.to_string())
    }
}

impl From<CalendarError> for DepositError {
    fn from(err: CalendarError) -> Self {
        DepositError::Calculation(err.to_string())
    }
}
