//! Holding Domain - Stock and Mutual Fund Positions
//!
//! This crate tracks a user's stock and mutual fund positions. Each position
//! keeps one quantity and one average unit cost; every purchase is merged in
//! with a volume-weighted average and recorded in an append-only lot log.
//!
//! # Key Concepts
//!
//! - **Position**: a holding in one stock or fund
//! - **Lot**: one purchase (quantity and unit cost) merged into a position
//! - **Average cost**: total cost basis divided by total quantity, rounded
//!   half up to two decimal places after every merge
//!
//! # Cost Precision
//!
//! Averaged costs keep 2 decimal places; lots keep the price as entered:
//! - Holding: 10 @ 100.00
//! - Lot: 3 @ 120.555
//! - Merged: 13 @ 104.74

pub mod position;
pub mod lot;
pub mod averaging;
pub mod ports;
pub mod services;
pub mod error;

pub use position::{Position, AssetClass, OpenPosition, PositionChanges};
pub use lot::{Lot, NewLot};
pub use averaging::{merge_lot, replay_lots, Holding, IncomingLot};
pub use ports::HoldingPort;
#[cfg(any(test, feature = "mock"))]
pub use ports::mock::MockHoldingPort;
pub use services::{HoldingService, HoldingAudit};
pub use error::HoldingError;
