//! Wealth Tracker Worker
//!
//! Process-level plumbing for scheduled jobs: configuration from the
//! environment, tracing setup, and the deduction sweep run by the
//! `deposit-sweep` binary.
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_worker::{config::WorkerConfig, sweep::run_sweep};
//!
//! let config = WorkerConfig::from_env()?;
//! let report = run_sweep(port, config.service_settings(), config.timezone.today()).await?;
//! ```

pub mod config;
pub mod error;
pub mod sweep;
pub mod telemetry;

pub use crate::config::WorkerConfig;
pub use error::WorkerError;
pub use sweep::run_sweep;
