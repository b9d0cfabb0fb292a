//! Holding Domain Ports
//!
//! `HoldingPort` stores positions together with their lot logs. Adapters:
//!
//! - **PostgreSQL Adapter**: `infra_db::PostgresHoldingAdapter`
//! - **Mock Adapter**: in-memory, for tests (`mock` feature)
//!
//! A position and the lot that changed it are always written in one atomic
//! step. Position writes follow the same version rule as the deposit port:
//! the stored version must equal the loaded one, and is incremented on write.

use async_trait::async_trait;

use core_kernel::{DomainPort, PortError, PositionId, UserId};

use crate::lot::Lot;
use crate::position::{AssetClass, Position};

/// Store operations for positions and lots
#[async_trait]
pub trait HoldingPort: DomainPort {
    /// Retrieves a position by ID, or `PortError::NotFound`
    async fn get_position(&self, id: PositionId) -> Result<Position, PortError>;

    /// Lists a user's positions, optionally of one asset class
    async fn list_positions(
        &self,
        user_id: UserId,
        asset_class: Option<AssetClass>,
    ) -> Result<Vec<Position>, PortError>;

    /// Inserts a new position and its opening lot
    async fn insert_position(&self, position: &Position, opening_lot: &Lot) -> Result<Position, PortError>;

    /// Updates a position and appends the lot that produced it
    async fn commit_lot(&self, position: &Position, lot: &Lot) -> Result<Position, PortError>;

    /// Updates a position without recording a lot
    async fn update_position(&self, position: &Position) -> Result<Position, PortError>;

    /// Deletes a position and its lots
    async fn delete_position(&self, id: PositionId) -> Result<(), PortError>;

    /// Lists a position's lots in the order they were recorded
    async fn list_lots(&self, position_id: PositionId) -> Result<Vec<Lot>, PortError>;

    /// Lists all of a user's lots, optionally of one asset class
    async fn list_user_lots(
        &self,
        user_id: UserId,
        asset_class: Option<AssetClass>,
    ) -> Result<Vec<Lot>, PortError>;
}

/// Mock implementation of HoldingPort for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::sync::RwLock;

    #[derive(Debug, Default)]
    struct Store {
        positions: HashMap<PositionId, Position>,
        lots: Vec<Lot>,
    }

    impl Store {
        fn check_version(&self, position: &Position) -> Result<(), PortError> {
            let stored = self
                .positions
                .get(&position.id)
                .ok_or_else(|| PortError::not_found("Position", position.id))?;
            if stored.version != position.version {
                return Err(PortError::stale("Position", position.id, position.version));
            }
            Ok(())
        }

        fn put(&mut self, position: &Position) -> Position {
            let mut stored = position.clone();
            stored.version += 1;
            self.positions.insert(stored.id, stored.clone());
            stored
        }
    }

    /// In-memory mock implementation of HoldingPort
    #[derive(Debug, Default)]
    pub struct MockHoldingPort {
        store: Arc<RwLock<Store>>,
        commit_conflicts: AtomicU32,
    }

    impl MockHoldingPort {
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes the next `count` calls to `commit_lot` fail with a conflict
        pub fn inject_commit_conflicts(&self, count: u32) {
            self.commit_conflicts.store(count, Ordering::SeqCst);
        }

        /// Overwrites a stored position as a concurrent writer would
        pub async fn overwrite(&self, position: Position) {
            let mut store = self.store.write().await;
            store.put(&position);
        }
    }

    impl DomainPort for MockHoldingPort {}

    #[async_trait]
    impl HoldingPort for MockHoldingPort {
        async fn get_position(&self, id: PositionId) -> Result<Position, PortError> {
            self.store
                .read()
                .await
                .positions
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Position", id))
        }

        async fn list_positions(
            &self,
            user_id: UserId,
            asset_class: Option<AssetClass>,
        ) -> Result<Vec<Position>, PortError> {
            let store = self.store.read().await;
            let mut positions: Vec<_> = store
                .positions
                .values()
                .filter(|p| p.user_id == user_id)
                .filter(|p| asset_class.map_or(true, |class| p.asset_class == class))
                .cloned()
                .collect();
            positions.sort_by_key(|p| (p.created_at, p.id));
            Ok(positions)
        }

        async fn insert_position(&self, position: &Position, opening_lot: &Lot) -> Result<Position, PortError> {
            let mut store = self.store.write().await;
            if store.positions.contains_key(&position.id) {
                return Err(PortError::conflict(format!("Position {} already exists", position.id)));
            }
            store.positions.insert(position.id, position.clone());
            store.lots.push(opening_lot.clone());
            Ok(position.clone())
        }

        async fn commit_lot(&self, position: &Position, lot: &Lot) -> Result<Position, PortError> {
            if self
                .commit_conflicts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(PortError::stale("Position", position.id, position.version));
            }

            let mut store = self.store.write().await;
            store.check_version(position)?;
            let stored = store.put(position);
            store.lots.push(lot.clone());
            Ok(stored)
        }

        async fn update_position(&self, position: &Position) -> Result<Position, PortError> {
            let mut store = self.store.write().await;
            store.check_version(position)?;
            Ok(store.put(position))
        }

        async fn delete_position(&self, id: PositionId) -> Result<(), PortError> {
            let mut store = self.store.write().await;
            store
                .positions
                .remove(&id)
                .ok_or_else(|| PortError::not_found("Position", id))?;
            store.lots.retain(|lot| lot.position_id != id);
            Ok(())
        }

        async fn list_lots(&self, position_id: PositionId) -> Result<Vec<Lot>, PortError> {
            let store = self.store.read().await;
            Ok(store
                .lots
                .iter()
                .filter(|lot| lot.position_id == position_id)
                .cloned()
                .collect())
        }

        async fn list_user_lots(
            &self,
            user_id: UserId,
            asset_class: Option<AssetClass>,
        ) -> Result<Vec<Lot>, PortError> {
            let store = self.store.read().await;
            Ok(store
                .lots
                .iter()
                .filter(|lot| lot.user_id == user_id)
                .filter(|lot| {
                    asset_class.map_or(true, |class| {
                        store
                            .positions
                            .get(&lot.position_id)
                            .is_some_and(|p| p.asset_class == class)
                    })
                })
                .cloned()
                .collect())
        }
    }
}
