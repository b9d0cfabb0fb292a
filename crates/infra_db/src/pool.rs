//! Connection pool and schema migrations
//!
//! The pool is tuned for short-lived jobs like the deduction sweep as well as
//! long-running processes; every connection identifies itself through
//! `application_name` and can carry a statement timeout so a sweep blocked
//! on a locked row fails instead of hanging.

use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::info;

use crate::error::DatabaseError;

/// Type alias for the PostgreSQL connection pool
pub type DatabasePool = PgPool;

const DEFAULT_URL: &str = "postgres://localhost/wealth_tracker";

/// Pool settings
///
/// ```rust
/// use infra_db::DatabaseConfig;
/// use std::time::Duration;
///
/// let config = DatabaseConfig::new("postgres://localhost/wealth_tracker")
///     .max_connections(4)
///     .application_name("deposit-sweep")
///     .statement_timeout(Duration::from_secs(15));
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// How long to wait for a free connection
    pub acquire_timeout: Duration,
    /// Server-side limit per statement; `None` keeps the server default
    pub statement_timeout: Option<Duration>,
    pub application_name: String,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(30),
            statement_timeout: None,
            application_name: "wealth-tracker".to_string(),
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// Parses the URL and applies the per-connection session settings
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::ConnectionFailed` for a malformed URL
    pub fn connect_options(&self) -> Result<PgConnectOptions, DatabaseError> {
        let options = PgConnectOptions::from_str(&self.url)
            .map_err(|e| DatabaseError::ConnectionFailed(format!("invalid database url: {}", e)))?
            .application_name(&self.application_name);

        Ok(match self.statement_timeout {
            Some(timeout) => {
                options.options([("statement_timeout", timeout.as_millis().to_string())])
            }
            None => options,
        })
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}

/// Opens a connection pool
///
/// # Errors
///
/// Returns `DatabaseError::ConnectionFailed` if the URL is malformed or the
/// first connection cannot be established
pub async fn create_pool(config: DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    info!(
        max_connections = config.max_connections,
        application_name = %config.application_name,
        statement_timeout_ms = config.statement_timeout.map(|t| t.as_millis() as u64),
        "Opening database pool"
    );

    let options = config.connect_options()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(options)
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

    Ok(pool)
}

/// Applies the embedded migrations under `crates/infra_db/migrations`
///
/// # Errors
///
/// Returns `DatabaseError::MigrationFailed` if a migration cannot be applied
pub async fn run_migrations(pool: &DatabasePool) -> Result<(), DatabaseError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
    info!("Schema is up to date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = DatabaseConfig::new("postgres://tracker@db/tracker")
            .max_connections(3)
            .statement_timeout(Duration::from_secs(15))
            .application_name("deposit-sweep");

        assert_eq!(config.max_connections, 3);
        assert_eq!(config.min_connections, 0);
        assert_eq!(config.statement_timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.application_name, "deposit-sweep");
    }

    #[test]
    fn test_default_points_at_local_database() {
        let config = DatabaseConfig::default();
        assert_eq!(config.url, DEFAULT_URL);
        assert!(config.statement_timeout.is_none());
    }

    #[test]
    fn test_connect_options_parse_url() {
        let options = DatabaseConfig::new("postgres://tracker@db.internal:6432/tracker")
            .connect_options()
            .unwrap();

        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6432);
        assert_eq!(options.get_database(), Some("tracker"));
    }

    #[test]
    fn test_malformed_url_is_rejected() {
        let result = DatabaseConfig::new("not a url").connect_options();
        assert!(matches!(result, Err(DatabaseError::ConnectionFailed(_))));
    }
}
