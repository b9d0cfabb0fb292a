//! Purchase lots
//!
//! Every purchase merged into a position is also recorded as a lot. The lot
//! log is append-only and, replayed in order, reproduces the position's
//! quantity and average cost.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use core_kernel::{LotId, MoneyError, PositionId, UserId};
use crate::averaging::IncomingLot;

/// A recorded purchase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    /// Unique identifier
    pub id: LotId,
    /// Position the lot was merged into
    pub position_id: PositionId,
    /// Owner
    pub user_id: UserId,
    /// Shares or units bought
    pub quantity: Decimal,
    /// Price or NAV paid per unit
    pub unit_cost: Decimal,
    /// Trade date
    pub purchase_date: NaiveDate,
    /// Date the lot was recorded
    pub recorded_at: NaiveDate,
}

impl Lot {
    pub fn new(
        position_id: PositionId,
        user_id: UserId,
        lot: IncomingLot,
        purchase_date: NaiveDate,
        recorded_at: NaiveDate,
    ) -> Self {
        Self {
            id: LotId::new(),
            position_id,
            user_id,
            quantity: lot.quantity,
            unit_cost: lot.unit_cost,
            purchase_date,
            recorded_at,
        }
    }

    /// Amount paid for the lot
    pub fn cost(&self) -> Result<Decimal, MoneyError> {
        self.quantity
            .checked_mul(self.unit_cost)
            .ok_or(MoneyError::Overflow)
    }
}

fn positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value > Decimal::ZERO {
        Ok(())
    } else {
        Err(ValidationError::new("not_positive"))
    }
}

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value >= Decimal::ZERO {
        Ok(())
    } else {
        Err(ValidationError::new("negative"))
    }
}

/// Request to add a purchase to an existing position
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewLot {
    #[validate(custom(function = "positive"))]
    pub quantity: Decimal,
    #[validate(custom(function = "non_negative"))]
    pub unit_cost: Decimal,
    pub purchase_date: NaiveDate,
}

impl NewLot {
    pub fn new(quantity: Decimal, unit_cost: Decimal, purchase_date: NaiveDate) -> Self {
        Self { quantity, unit_cost, purchase_date }
    }

    pub fn incoming(&self) -> IncomingLot {
        IncomingLot::new(self.quantity, self.unit_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
    }

    #[test]
    fn test_lot_cost() {
        let lot = Lot::new(
            PositionId::new(),
            UserId::new(),
            IncomingLot::new(dec!(3), dec!(101.25)),
            date(),
            date(),
        );
        assert_eq!(lot.cost(), Ok(dec!(303.75)));
        assert!(lot.id.to_string().starts_with("LOT-"));
    }

    #[test]
    fn test_lot_cost_overflow() {
        let lot = Lot::new(
            PositionId::new(),
            UserId::new(),
            IncomingLot::new(Decimal::MAX, dec!(2)),
            date(),
            date(),
        );
        assert_eq!(lot.cost(), Err(MoneyError::Overflow));
    }

    #[test]
    fn test_new_lot_validation() {
        let errors = NewLot::new(dec!(0), dec!(-1), date()).validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("quantity"));
        assert!(fields.contains_key("unit_cost"));

        assert!(NewLot::new(dec!(0.5), dec!(0), date()).validate().is_ok());
    }
}
