//! Worker configuration
//!
//! Values come from `TRACKER_`-prefixed environment variables; anything unset
//! falls back to [`WorkerConfig::default`].
//!
//! | Variable | Default |
//! |----------|---------|
//! | `TRACKER_DATABASE_URL` | `postgres://localhost/wealth_tracker` |
//! | `TRACKER_LOG_LEVEL` | `info` |
//! | `TRACKER_MAX_CONNECTIONS` | `5` |
//! | `TRACKER_TIMEZONE` | `UTC` |
//! | `TRACKER_CONFLICT_RETRY_ATTEMPTS` | `3` |
//! | `TRACKER_MISSING_ACCOUNT_POLICY` | `warn` |
//! | `TRACKER_STATEMENT_TIMEOUT_SECS` | `30` |

use std::time::Duration;

use serde::Deserialize;
use validator::Validate;

use core_kernel::{ConflictRetry, Timezone};
use domain_deposit::{DepositServiceSettings, MissingAccountPolicy};
use infra_db::DatabaseConfig;

use crate::error::WorkerError;

/// Worker configuration
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct WorkerConfig {
    /// PostgreSQL connection string
    #[validate(length(min = 1))]
    pub database_url: String,
    /// Log level or `EnvFilter` directive
    pub log_level: String,
    /// Pool size
    #[validate(range(min = 1, max = 100))]
    pub max_connections: u32,
    /// Timezone that decides which calendar day "today" is
    pub timezone: Timezone,
    /// Attempts per deposit before a version conflict is reported
    #[validate(range(min = 1, max = 20))]
    pub conflict_retry_attempts: u32,
    /// Handling of deposits whose linked account is gone
    pub missing_account_policy: MissingAccountPolicy,
    /// Per-statement limit so a locked row cannot stall the sweep
    #[validate(range(min = 1, max = 3600))]
    pub statement_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/wealth_tracker".to_string(),
            log_level: "info".to_string(),
            max_connections: 5,
            timezone: Timezone::default(),
            conflict_retry_attempts: ConflictRetry::default().max_attempts,
            missing_account_policy: MissingAccountPolicy::default(),
            statement_timeout_secs: 30,
        }
    }
}

impl WorkerConfig {
    /// Loads configuration from the process environment
    pub fn from_env() -> Result<Self, WorkerError> {
        Self::from_environment(config::Environment::with_prefix("TRACKER"))
    }

    /// Loads configuration from the given environment source
    pub fn from_environment(environment: config::Environment) -> Result<Self, WorkerError> {
        let config: WorkerConfig = config::Config::builder()
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()?;

        config
            .validate()
            .map_err(|e| WorkerError::InvalidConfig(e.to_string()))?;
        Ok(config)
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.database_url.clone())
            .max_connections(self.max_connections)
            .min_connections(1)
            .application_name("deposit-sweep")
            .statement_timeout(Duration::from_secs(self.statement_timeout_secs))
    }

    pub fn service_settings(&self) -> DepositServiceSettings {
        DepositServiceSettings {
            retry: ConflictRetry::new(self.conflict_retry_attempts),
            missing_account: self.missing_account_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn environment(vars: &[(&str, &str)]) -> config::Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix("TRACKER").source(Some(source))
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = WorkerConfig::from_environment(environment(&[])).unwrap();

        assert_eq!(config.database_url, "postgres://localhost/wealth_tracker");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.missing_account_policy, MissingAccountPolicy::Warn);
        assert_eq!(config.service_settings(), DepositServiceSettings::default());
    }

    #[test]
    fn test_reads_prefixed_variables() {
        let config = WorkerConfig::from_environment(environment(&[
            ("TRACKER_DATABASE_URL", "postgres://db.internal/tracker"),
            ("TRACKER_MAX_CONNECTIONS", "12"),
            ("TRACKER_TIMEZONE", "Asia/Kolkata"),
            ("TRACKER_CONFLICT_RETRY_ATTEMPTS", "5"),
            ("TRACKER_MISSING_ACCOUNT_POLICY", "fail"),
        ]))
        .unwrap();

        assert_eq!(config.database_url, "postgres://db.internal/tracker");
        assert_eq!(config.database_config().max_connections, 12);
        assert_eq!(
            config.database_config().statement_timeout,
            Some(Duration::from_secs(30))
        );
        assert_eq!(config.timezone, "Asia/Kolkata".parse::<Timezone>().unwrap());

        let settings = config.service_settings();
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.missing_account, MissingAccountPolicy::Fail);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let zero_retries = WorkerConfig::from_environment(environment(&[(
            "TRACKER_CONFLICT_RETRY_ATTEMPTS",
            "0",
        )]));
        assert!(matches!(zero_retries, Err(WorkerError::InvalidConfig(_))));

        let bad_zone = WorkerConfig::from_environment(environment(&[("TRACKER_TIMEZONE", "Mars/Olympus")]));
        assert!(matches!(bad_zone, Err(WorkerError::Config(_))));
    }
}
