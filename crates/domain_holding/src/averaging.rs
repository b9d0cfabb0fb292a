//! Weighted-average cost accumulation
//!
//! Adding a lot to a position merges it into a single quantity and a
//! volume-weighted average unit cost:
//!
//! ```text
//! new_quantity  = q1 + q2
//! new_unit_cost = round2((q1 * c1 + q2 * c2) / (q1 + q2))
//! ```
//!
//! The averaged cost is rounded half up to two decimal places after every
//! merge, so replaying a lot log reproduces the stored cost exactly.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{round_currency, MoneyError};
use crate::error::HoldingError;
use crate::lot::Lot;

/// Quantity and average unit cost of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Holding {
    pub quantity: Decimal,
    pub unit_cost: Decimal,
}

impl Holding {
    pub fn new(quantity: Decimal, unit_cost: Decimal) -> Self {
        Self { quantity, unit_cost }
    }

    /// A holding with nothing in it
    pub fn empty() -> Self {
        Self::default()
    }

    /// Total amount paid, `quantity * unit_cost`
    pub fn cost_basis(&self) -> Result<Decimal, MoneyError> {
        self.quantity
            .checked_mul(self.unit_cost)
            .ok_or(MoneyError::Overflow)
    }

    fn validate(&self) -> Result<(), HoldingError> {
        if self.quantity < Decimal::ZERO {
            return Err(HoldingError::InvalidHolding(format!(
                "quantity {} is negative",
                self.quantity
            )));
        }
        if self.unit_cost < Decimal::ZERO {
            return Err(HoldingError::InvalidHolding(format!(
                "unit cost {} is negative",
                self.unit_cost
            )));
        }
        Ok(())
    }
}

/// A purchase to merge into a holding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingLot {
    pub quantity: Decimal,
    pub unit_cost: Decimal,
}

impl IncomingLot {
    pub fn new(quantity: Decimal, unit_cost: Decimal) -> Self {
        Self { quantity, unit_cost }
    }

    fn validate(&self) -> Result<(), HoldingError> {
        if self.quantity <= Decimal::ZERO {
            return Err(HoldingError::InvalidLot(format!(
                "quantity must be positive, got {}",
                self.quantity
            )));
        }
        if self.unit_cost < Decimal::ZERO {
            return Err(HoldingError::InvalidLot(format!(
                "unit cost cannot be negative, got {}",
                self.unit_cost
            )));
        }
        Ok(())
    }
}

impl From<&Lot> for IncomingLot {
    fn from(lot: &Lot) -> Self {
        Self::new(lot.quantity, lot.unit_cost)
    }
}

/// Merges `incoming` into `existing`
///
/// An empty holding takes the incoming cost, rounded, without computing a
/// ratio.
///
/// # Errors
///
/// * `HoldingError::InvalidHolding` - negative existing quantity or cost
/// * `HoldingError::InvalidLot` - non-positive incoming quantity or negative cost
/// * `HoldingError::Calculation` - the cost basis overflows
///
/// # Example
///
/// ```rust
/// use domain_holding::{merge_lot, Holding, IncomingLot};
/// use rust_decimal_macros::dec;
///
/// let merged = merge_lot(
///     Holding::new(dec!(10), dec!(100)),
///     IncomingLot::new(dec!(10), dec!(200)),
/// ).unwrap();
/// assert_eq!(merged, Holding::new(dec!(20), dec!(150.00)));
/// ```
pub fn merge_lot(existing: Holding, incoming: IncomingLot) -> Result<Holding, HoldingError> {
    existing.validate()?;
    incoming.validate()?;

    let quantity = existing
        .quantity
        .checked_add(incoming.quantity)
        .ok_or(MoneyError::Overflow)?;

    if existing.quantity.is_zero() {
        return Ok(Holding::new(quantity, round_currency(incoming.unit_cost)));
    }

    let incoming_cost = incoming
        .quantity
        .checked_mul(incoming.unit_cost)
        .ok_or(MoneyError::Overflow)?;
    let total_cost = existing
        .cost_basis()?
        .checked_add(incoming_cost)
        .ok_or(MoneyError::Overflow)?;
    let average = total_cost
        .checked_div(quantity)
        .ok_or(MoneyError::DivisionByZero)?;

    Ok(Holding::new(quantity, round_currency(average)))
}

/// Rebuilds a holding from its lot log, oldest lot first
///
/// # Errors
///
/// Fails on the first lot `merge_lot` rejects
pub fn replay_lots<'a, I>(lots: I) -> Result<Holding, HoldingError>
where
    I: IntoIterator<Item = &'a Lot>,
{
    lots.into_iter()
        .try_fold(Holding::empty(), |holding, lot| merge_lot(holding, IncomingLot::from(lot)))
}
