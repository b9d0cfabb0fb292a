//! Worker error handling

use thiserror::Error;

use domain_deposit::DepositError;
use infra_db::DatabaseError;

/// Errors raised while setting up or running a job
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Logging setup failed: {0}")]
    Telemetry(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Deposit error: {0}")]
    Deposit(#[from] DepositError),
}
