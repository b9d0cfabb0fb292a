//! Holding domain errors

use thiserror::Error;

use core_kernel::{MoneyError, PortError};

/// Errors that can occur in the holding domain
#[derive(Debug, Error)]
pub enum HoldingError {
    #[error("Position not found: {0}")]
    PositionNotFound(String),

    #[error("Position {0} does not belong to the requesting user")]
    NotOwned(String),

    /// An incoming lot was rejected before any state changed
    #[error("Invalid lot: {0}")]
    InvalidLot(String),

    /// The stored quantity or cost is out of range
    #[error("Invalid holding: {0}")]
    InvalidHolding(String),

    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    #[error("Calculation error: {0}")]
    Calculation(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("Store error: {0}")]
    Port(#[from] PortError),
}

impl From<MoneyError> for HoldingError {
    fn from(err: MoneyError) -> Self {
        HoldingError::Calculation(err.to_string())
    }
}
