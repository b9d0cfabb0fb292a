//! Ports and Adapters Infrastructure
//!
//! Each domain crate defines a store port trait (`DepositPort`,
//! `HoldingPort`) that extends [`DomainPort`]. Adapters implement those traits
//! against PostgreSQL (`infra_db`) or in memory (the domain crates' `mock`
//! modules), and all of them report failures through [`PortError`].
//!
//! ```text
//!   DepositService / HoldingService
//!                  │
//!                  ▼
//!        DepositPort / HoldingPort
//!           ▲                ▲
//!           │                │
//!   PostgreSQL adapter   in-memory adapter
//! ```
//!
//! # Optimistic versioning
//!
//! Every stored record carries a `version`. A write succeeds only when the
//! stored version equals the version the caller loaded; otherwise the adapter
//! returns [`PortError::Conflict`] and writes nothing. Services react to a
//! conflict by reloading and recomputing, bounded by [`ConflictRetry`].

use std::fmt;
use thiserror::Error;
use serde::{Deserialize, Serialize};

/// Error type for port operations
#[derive(Debug, Error)]
pub enum PortError {
    /// The requested entity was not found
    #[error("Not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: String,
        id: String,
    },

    /// A validation error occurred
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// The stored record changed since it was loaded
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
    },

    /// Connection to the underlying store failed
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An internal error occurred
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl PortError {
    /// Creates a NotFound error
    pub fn not_found(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        PortError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    /// Creates a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Creates a Conflict error for a stale version
    pub fn stale(entity_type: &str, id: impl fmt::Display, expected_version: i64) -> Self {
        PortError::Conflict {
            message: format!(
                "{} {} was modified concurrently (expected version {})",
                entity_type, id, expected_version
            ),
        }
    }

    /// Creates a Conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        PortError::Conflict {
            message: message.into(),
        }
    }

    /// Creates a Connection error
    pub fn connection(message: impl Into<String>) -> Self {
        PortError::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        PortError::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Store unreachable; the same call may succeed later
    pub fn is_transient(&self) -> bool {
        matches!(self, PortError::Connection { .. })
    }

    /// Returns true if this error indicates the entity was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound { .. })
    }

    /// Returns true if a version check failed
    pub fn is_conflict(&self) -> bool {
        matches!(self, PortError::Conflict { .. })
    }
}

/// Marker trait for all domain ports
///
/// Port traits extend this marker so they can be shared across tasks.
pub trait DomainPort: Send + Sync + 'static {}

/// Bound on how often a service repeats a load-compute-commit cycle after a
/// version conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRetry {
    /// Total attempts including the first one (at least 1)
    pub max_attempts: u32,
}

impl ConflictRetry {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// Whether another attempt is allowed after `attempt` (1-based) failed
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for ConflictRetry {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}
