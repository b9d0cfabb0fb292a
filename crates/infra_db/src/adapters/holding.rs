//! PostgreSQL Holding Adapter
//!
//! Implements `HoldingPort` on top of the `HoldingRepository`.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{DomainPort, PortError, PositionId, UserId};
use domain_holding::{AssetClass, HoldingPort, Lot, Position};

use crate::error::DatabaseError;
use crate::repositories::holding::{HoldingRepository, LotRow, PositionRow};

/// PostgreSQL-backed implementation of the HoldingPort trait
#[derive(Debug, Clone)]
pub struct PostgresHoldingAdapter {
    repository: HoldingRepository,
}

impl PostgresHoldingAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: HoldingRepository::new(pool),
        }
    }

    pub fn repository(&self) -> &HoldingRepository {
        &self.repository
    }
}

impl DomainPort for PostgresHoldingAdapter {}

#[async_trait]
impl HoldingPort for PostgresHoldingAdapter {
    #[instrument(skip(self), fields(position_id = %id))]
    async fn get_position(&self, id: PositionId) -> Result<Position, PortError> {
        let row = self
            .repository
            .find_position(id.into())
            .await?
            .ok_or_else(|| PortError::not_found("Position", id))?;
        Ok(row_to_position(row)?)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn list_positions(
        &self,
        user_id: UserId,
        asset_class: Option<AssetClass>,
    ) -> Result<Vec<Position>, PortError> {
        let rows = self
            .repository
            .list_positions(user_id.into(), asset_class.map(|class| class.as_str()))
            .await?;
        debug!(count = rows.len(), "Loaded positions");
        rows.into_iter()
            .map(|row| row_to_position(row).map_err(PortError::from))
            .collect()
    }

    #[instrument(skip(self, position, opening_lot), fields(position_id = %position.id))]
    async fn insert_position(&self, position: &Position, opening_lot: &Lot) -> Result<Position, PortError> {
        let stored = self
            .repository
            .insert_position(&position_to_row(position), &lot_to_row(opening_lot))
            .await?;
        Ok(row_to_position(stored)?)
    }

    #[instrument(
        skip(self, position, lot),
        fields(position_id = %position.id, lot_id = %lot.id, version = position.version)
    )]
    async fn commit_lot(&self, position: &Position, lot: &Lot) -> Result<Position, PortError> {
        let stored = self
            .repository
            .commit_lot(&position_to_row(position), &lot_to_row(lot))
            .await?;
        debug!(quantity = %stored.quantity, unit_cost = %stored.unit_cost, "Lot committed");
        Ok(row_to_position(stored)?)
    }

    #[instrument(skip(self, position), fields(position_id = %position.id, version = position.version))]
    async fn update_position(&self, position: &Position) -> Result<Position, PortError> {
        let stored = self.repository.update_position(&position_to_row(position)).await?;
        Ok(row_to_position(stored)?)
    }

    #[instrument(skip(self), fields(position_id = %id))]
    async fn delete_position(&self, id: PositionId) -> Result<(), PortError> {
        if self.repository.delete_position(id.into()).await? {
            Ok(())
        } else {
            Err(PortError::not_found("Position", id))
        }
    }

    #[instrument(skip(self), fields(position_id = %position_id))]
    async fn list_lots(&self, position_id: PositionId) -> Result<Vec<Lot>, PortError> {
        let rows = self.repository.list_lots(position_id.into()).await?;
        Ok(rows.into_iter().map(row_to_lot).collect())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn list_user_lots(
        &self,
        user_id: UserId,
        asset_class: Option<AssetClass>,
    ) -> Result<Vec<Lot>, PortError> {
        let rows = self
            .repository
            .list_user_lots(user_id.into(), asset_class.map(|class| class.as_str()))
            .await?;
        Ok(rows.into_iter().map(row_to_lot).collect())
    }
}

fn row_to_position(row: PositionRow) -> Result<Position, DatabaseError> {
    let asset_class = AssetClass::parse(&row.asset_class).ok_or_else(|| {
        DatabaseError::CorruptRow(format!(
            "position {} has unknown asset class '{}'",
            row.id, row.asset_class
        ))
    })?;

    Ok(Position {
        id: row.id.into(),
        user_id: row.user_id.into(),
        asset_class,
        name: row.name,
        symbol: row.symbol,
        quantity: row.quantity,
        unit_cost: row.unit_cost,
        purchase_date: row.purchase_date,
        created_at: row.created_at,
        updated_at: row.updated_at,
        version: row.version,
    })
}

fn position_to_row(position: &Position) -> PositionRow {
    PositionRow {
        id: position.id.into(),
        user_id: position.user_id.into(),
        asset_class: position.asset_class.as_str().to_string(),
        name: position.name.clone(),
        symbol: position.symbol.clone(),
        quantity: position.quantity,
        unit_cost: position.unit_cost,
        purchase_date: position.purchase_date,
        created_at: position.created_at,
        updated_at: position.updated_at,
        version: position.version,
    }
}

fn row_to_lot(row: LotRow) -> Lot {
    Lot {
        id: row.id.into(),
        position_id: row.position_id.into(),
        user_id: row.user_id.into(),
        quantity: row.quantity,
        unit_cost: row.unit_cost,
        purchase_date: row.purchase_date,
        recorded_at: row.recorded_at,
    }
}

fn lot_to_row(lot: &Lot) -> LotRow {
    LotRow {
        id: lot.id.into(),
        position_id: lot.position_id.into(),
        user_id: lot.user_id.into(),
        quantity: lot.quantity,
        unit_cost: lot.unit_cost,
        purchase_date: lot.purchase_date,
        recorded_at: lot.recorded_at,
    }
}
