//! Infrastructure Database Layer
//!
//! PostgreSQL storage for the wealth tracker, built on SQLx.
//!
//! # Architecture
//!
//! - `repositories` hold the SQL and work on plain row types
//! - `adapters` implement the domain ports (`DepositPort`, `HoldingPort`)
//!   on top of the repositories
//! - `pool` creates the connection pool and runs the embedded migrations
//!
//! # Concurrency
//!
//! Every mutable row carries a `version` column. Updates are conditional on
//! the version that was read and increment it; a mismatch surfaces as
//! `DatabaseError::StaleVersion`, which the adapters report as a port
//! conflict so services can reload and retry.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresDepositAdapter};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/wealth_tracker")).await?;
//! run_migrations(&pool).await?;
//! let adapter = PostgresDepositAdapter::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{DatabasePool, create_pool, run_migrations, DatabaseConfig};
pub use error::DatabaseError;
pub use adapters::{PostgresDepositAdapter, PostgresHoldingAdapter};
