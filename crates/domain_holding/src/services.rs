//! Holding domain services

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use core_kernel::{ConflictRetry, PositionId, PortError, UserId};

use crate::averaging::{replay_lots, Holding};
use crate::error::HoldingError;
use crate::lot::{Lot, NewLot};
use crate::ports::HoldingPort;
use crate::position::{AssetClass, OpenPosition, Position, PositionChanges};

/// Stored state of a position compared with its replayed lot log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingAudit {
    pub position_id: PositionId,
    pub stored: Holding,
    pub replayed: Holding,
    pub lot_count: usize,
}

impl HoldingAudit {
    /// True when the lot log reproduces the stored quantity and cost
    pub fn is_consistent(&self) -> bool {
        self.stored == self.replayed
    }
}

/// Service for stock and mutual fund positions
pub struct HoldingService {
    port: Arc<dyn HoldingPort>,
    retry: ConflictRetry,
}

impl HoldingService {
    pub fn new(port: Arc<dyn HoldingPort>) -> Self {
        Self::with_retry(port, ConflictRetry::default())
    }

    pub fn with_retry(port: Arc<dyn HoldingPort>, retry: ConflictRetry) -> Self {
        Self { port, retry }
    }

    /// Opens a position and records its first purchase as a lot
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn open_position(
        &self,
        user_id: UserId,
        request: OpenPosition,
        today: NaiveDate,
    ) -> Result<Position, HoldingError> {
        request
            .validate()
            .map_err(|e| HoldingError::InvalidPosition(e.to_string()))?;

        let (mut position, lot) = Position::open(
            user_id,
            request.asset_class,
            request.name,
            request.first_lot,
            today,
        )?;
        position.symbol = request.symbol;

        let stored = self.port.insert_position(&position, &lot).await?;
        info!(
            position_id = %stored.id,
            asset_class = stored.asset_class.as_str(),
            quantity = %stored.quantity,
            "Position opened"
        );
        Ok(stored)
    }

    /// Merges a purchase into a position
    ///
    /// Returns the stored position and the recorded lot. A rejected lot
    /// leaves the stored position untouched.
    ///
    /// # Errors
    ///
    /// * `HoldingError::InvalidLot` - non-positive quantity or negative cost
    /// * `HoldingError::ConcurrentModification` - the position kept changing
    #[instrument(skip(self, new_lot), fields(user_id = %user_id, position_id = %id))]
    pub async fn add_lot(
        &self,
        user_id: UserId,
        id: PositionId,
        new_lot: NewLot,
        today: NaiveDate,
    ) -> Result<(Position, Lot), HoldingError> {
        new_lot
            .validate()
            .map_err(|e| HoldingError::InvalidLot(e.to_string()))?;

        let mut attempt = 1;
        loop {
            let mut position = self.get_position(user_id, id).await?;
            let lot = position.add_lot(new_lot.clone(), today)?;

            match self.port.commit_lot(&position, &lot).await {
                Ok(stored) => {
                    info!(
                        quantity = %stored.quantity,
                        unit_cost = %stored.unit_cost,
                        "Lot added to position"
                    );
                    return Ok((stored, lot));
                }
                Err(err) => self.conflict_or_fail(err, attempt, "add lot")?,
            }
            attempt += 1;
        }
    }

    #[instrument(skip(self), fields(user_id = %user_id, position_id = %id))]
    pub async fn get_position(&self, user_id: UserId, id: PositionId) -> Result<Position, HoldingError> {
        let position = self.port.get_position(id).await.map_err(|e| {
            if e.is_not_found() {
                HoldingError::PositionNotFound(id.to_string())
            } else {
                e.into()
            }
        })?;
        if position.user_id != user_id {
            return Err(HoldingError::NotOwned(id.to_string()));
        }
        Ok(position)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_positions(
        &self,
        user_id: UserId,
        asset_class: Option<AssetClass>,
    ) -> Result<Vec<Position>, HoldingError> {
        Ok(self.port.list_positions(user_id, asset_class).await?)
    }

    /// Overwrites a position's fields directly
    ///
    /// No lot is recorded, so a later audit reports the difference.
    #[instrument(skip(self, changes), fields(user_id = %user_id, position_id = %id))]
    pub async fn update_position(
        &self,
        user_id: UserId,
        id: PositionId,
        changes: PositionChanges,
        today: NaiveDate,
    ) -> Result<Position, HoldingError> {
        changes
            .validate()
            .map_err(|e| HoldingError::InvalidPosition(e.to_string()))?;

        let mut attempt = 1;
        loop {
            let mut position = self.get_position(user_id, id).await?;
            position.apply_changes(changes.clone(), today);
            position.validate()?;

            match self.port.update_position(&position).await {
                Ok(stored) => {
                    info!(version = stored.version, "Position updated");
                    return Ok(stored);
                }
                Err(err) => self.conflict_or_fail(err, attempt, "update position")?,
            }
            attempt += 1;
        }
    }

    /// Deletes a position together with its lot log
    #[instrument(skip(self), fields(user_id = %user_id, position_id = %id))]
    pub async fn delete_position(&self, user_id: UserId, id: PositionId) -> Result<(), HoldingError> {
        self.get_position(user_id, id).await?;
        self.port.delete_position(id).await?;
        info!("Position deleted");
        Ok(())
    }

    /// Lot log of one position, oldest first
    #[instrument(skip(self), fields(user_id = %user_id, position_id = %id))]
    pub async fn lots(&self, user_id: UserId, id: PositionId) -> Result<Vec<Lot>, HoldingError> {
        self.get_position(user_id, id).await?;
        Ok(self.port.list_lots(id).await?)
    }

    /// Every lot of the user, optionally of one asset class
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn all_lots(
        &self,
        user_id: UserId,
        asset_class: Option<AssetClass>,
    ) -> Result<Vec<Lot>, HoldingError> {
        Ok(self.port.list_user_lots(user_id, asset_class).await?)
    }

    /// Replays a position's lot log and compares it with the stored state
    #[instrument(skip(self), fields(user_id = %user_id, position_id = %id))]
    pub async fn audit_position(&self, user_id: UserId, id: PositionId) -> Result<HoldingAudit, HoldingError> {
        let position = self.get_position(user_id, id).await?;
        let lots = self.port.list_lots(id).await?;
        let replayed = replay_lots(&lots)?;

        let audit = HoldingAudit {
            position_id: id,
            stored: position.holding(),
            replayed,
            lot_count: lots.len(),
        };
        if !audit.is_consistent() {
            warn!(
                stored_quantity = %audit.stored.quantity,
                replayed_quantity = %audit.replayed.quantity,
                "Position differs from its lot log"
            );
        }
        Ok(audit)
    }

    fn conflict_or_fail(&self, err: PortError, attempt: u32, operation: &str) -> Result<(), HoldingError> {
        if !err.is_conflict() {
            return Err(err.into());
        }
        if self.retry.allows_retry_after(attempt) {
            debug!(attempt, operation, "Version conflict, retrying");
            return Ok(());
        }
        Err(HoldingError::ConcurrentModification(format!(
            "{} failed after {} attempts: {}",
            operation, attempt, err
        )))
    }
}
