//! Stock and mutual fund positions

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use core_kernel::{PositionId, UserId};
use crate::averaging::{merge_lot, Holding};
use crate::error::HoldingError;
use crate::lot::{Lot, NewLot};

/// Asset class of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    /// Listed shares, quantity in shares
    Stock,
    /// Fund units, cost is the NAV paid
    MutualFund,
}

impl AssetClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Stock => "stock",
            AssetClass::MutualFund => "mutual_fund",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "stock" => Some(AssetClass::Stock),
            "mutual_fund" => Some(AssetClass::MutualFund),
            _ => None,
        }
    }
}

/// A user's holding in one stock or fund
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Unique identifier
    pub id: PositionId,
    /// Owner
    pub user_id: UserId,
    pub asset_class: AssetClass,
    /// Company or scheme name
    pub name: String,
    /// Ticker for stocks, scheme code for funds
    pub symbol: Option<String>,
    /// Shares or units held
    pub quantity: Decimal,
    /// Average price or NAV paid per unit
    pub unit_cost: Decimal,
    /// Date of the first purchase
    pub purchase_date: NaiveDate,
    pub created_at: NaiveDate,
    pub updated_at: NaiveDate,
    /// Optimistic concurrency version
    pub version: i64,
}

impl Position {
    /// Opens a position from its first purchase
    ///
    /// Returns the position with the opening lot merged in and the lot to
    /// record alongside it.
    ///
    /// # Errors
    ///
    /// Returns `HoldingError::InvalidPosition` for a blank name and
    /// `HoldingError::InvalidLot` for an invalid first purchase
    pub fn open(
        user_id: UserId,
        asset_class: AssetClass,
        name: impl Into<String>,
        first_lot: NewLot,
        today: NaiveDate,
    ) -> Result<(Self, Lot), HoldingError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(HoldingError::InvalidPosition("name is required".to_string()));
        }

        let mut position = Self {
            id: PositionId::new(),
            user_id,
            asset_class,
            name,
            symbol: None,
            quantity: Decimal::ZERO,
            unit_cost: Decimal::ZERO,
            purchase_date: first_lot.purchase_date,
            created_at: today,
            updated_at: today,
            version: 0,
        };
        let lot = position.add_lot(first_lot, today)?;
        Ok((position, lot))
    }

    /// Sets the ticker or scheme code
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// Current quantity and average cost
    pub fn holding(&self) -> Holding {
        Holding::new(self.quantity, self.unit_cost)
    }

    /// Merges a purchase into the position
    ///
    /// The position is unchanged when the lot is rejected. The returned lot
    /// must be stored together with the updated position.
    pub fn add_lot(&mut self, new_lot: NewLot, today: NaiveDate) -> Result<Lot, HoldingError> {
        let incoming = new_lot.incoming();
        let merged = merge_lot(self.holding(), incoming)?;

        self.quantity = merged.quantity;
        self.unit_cost = merged.unit_cost;
        self.updated_at = today;

        Ok(Lot::new(self.id, self.user_id, incoming, new_lot.purchase_date, today))
    }

    /// Overwrites the editable fields without recording a lot
    pub fn apply_changes(&mut self, changes: PositionChanges, today: NaiveDate) {
        self.name = changes.name;
        self.symbol = changes.symbol;
        self.quantity = changes.quantity;
        self.unit_cost = changes.unit_cost;
        self.purchase_date = changes.purchase_date;
        self.updated_at = today;
    }

    pub fn validate(&self) -> Result<(), HoldingError> {
        if self.name.trim().is_empty() {
            return Err(HoldingError::InvalidPosition("name is required".to_string()));
        }
        if self.quantity < Decimal::ZERO || self.unit_cost < Decimal::ZERO {
            return Err(HoldingError::InvalidPosition(
                "quantity and unit cost cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value >= Decimal::ZERO {
        Ok(())
    } else {
        Err(ValidationError::new("negative"))
    }
}

/// Request to open a position
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OpenPosition {
    pub asset_class: AssetClass,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 1, max = 32))]
    pub symbol: Option<String>,
    #[validate(nested)]
    pub first_lot: NewLot,
}

/// Direct edit of a position's fields
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PositionChanges {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 1, max = 32))]
    pub symbol: Option<String>,
    #[validate(custom(function = "non_negative"))]
    pub quantity: Decimal,
    #[validate(custom(function = "non_negative"))]
    pub unit_cost: Decimal,
    pub purchase_date: NaiveDate,
}
