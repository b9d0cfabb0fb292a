//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! wealth tracker test suite.
//!
//! # Modules
//!
//! - `fixtures`: Fixed dates, amounts and identifiers
//! - `builders`: Builder patterns for deposits, accounts and positions
//! - `database`: PostgreSQL test containers with the schema applied
//! - `assertions`: Assertion helpers for schedules and positions
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
pub use generators::*;
