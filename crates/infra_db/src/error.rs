//! Database error types and their translation into port errors

use thiserror::Error;

use core_kernel::PortError;

/// Errors raised by the repositories and the pool
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    /// SQLSTATE 23505
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// SQLSTATE 23503
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// SQLSTATE 23514, e.g. a watermark that is not the first of a month
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// The row's version no longer matches the version that was read
    #[error("Stale version: {entity} {id} is no longer at version {expected}")]
    StaleVersion {
        entity: &'static str,
        id: String,
        expected: i64,
    },

    /// SQLSTATE 40001
    #[error("Serialization failure: {0}")]
    SerializationFailure(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value cannot be mapped back to a domain type
    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),
}

impl DatabaseError {
    /// ```rust
    /// use infra_db::DatabaseError;
    ///
    /// let error = DatabaseError::not_found("Deposit", "DEP-123");
    /// assert!(error.to_string().contains("Deposit"));
    /// ```
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        DatabaseError::NotFound(format!("{} with id '{}' not found", entity, id))
    }

    pub fn stale(entity: &'static str, id: impl std::fmt::Display, expected: i64) -> Self {
        DatabaseError::StaleVersion {
            entity,
            id: id.to_string(),
            expected,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound(_))
    }

    /// Maps an sqlx error to the most specific variant
    ///
    /// Server errors are classified by SQLSTATE
    /// (<https://www.postgresql.org/docs/current/errcodes-appendix.html>);
    /// anything unclassified keeps the original sqlx error as its source.
    pub fn from_sqlx(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.code().as_deref() {
                    Some("23505") => DatabaseError::DuplicateEntry(message),
                    Some("23503") => DatabaseError::ForeignKeyViolation(message),
                    Some("23514") => DatabaseError::ConstraintViolation(message),
                    Some("40001") => DatabaseError::SerializationFailure(message),
                    _ => DatabaseError::QueryFailed(message),
                }
            }
            _ => DatabaseError::SqlError(error),
        }
    }
}

/// Stale versions, duplicates and serialization failures all surface as
/// `PortError::Conflict` so the services reload and retry them.
impl From<DatabaseError> for PortError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(message) => PortError::NotFound {
                entity_type: "record".to_string(),
                id: message,
            },
            DatabaseError::StaleVersion { .. }
            | DatabaseError::DuplicateEntry(_)
            | DatabaseError::SerializationFailure(_) => PortError::conflict(err.to_string()),
            DatabaseError::ForeignKeyViolation(_) | DatabaseError::ConstraintViolation(_) => {
                PortError::validation(err.to_string())
            }
            DatabaseError::ConnectionFailed(_) | DatabaseError::PoolExhausted => {
                PortError::connection(err.to_string())
            }
            other => PortError::Internal {
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_maps_to_conflict() {
        let port: PortError = DatabaseError::stale("Deposit", "DEP-1", 3).into();
        assert!(port.is_conflict());
    }

    #[test]
    fn test_not_found_maps_to_not_found() {
        let port: PortError = DatabaseError::not_found("Position", "POS-9").into();
        assert!(port.is_not_found());
    }

    #[test]
    fn test_pool_timeout_is_transient() {
        let port: PortError = DatabaseError::from_sqlx(sqlx::Error::PoolTimedOut).into();
        assert!(port.is_transient());
    }

    #[test]
    fn test_row_not_found() {
        assert!(DatabaseError::from_sqlx(sqlx::Error::RowNotFound).is_not_found());
    }

    #[test]
    fn test_unclassified_error_keeps_source() {
        let err = DatabaseError::from_sqlx(sqlx::Error::WorkerCrashed);
        assert!(matches!(err, DatabaseError::SqlError(sqlx::Error::WorkerCrashed)));

        let port: PortError = err.into();
        assert!(matches!(port, PortError::Internal { source: Some(_), .. }));
    }
}
