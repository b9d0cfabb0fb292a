//! Wealth Tracker - Deduction Sweep Binary
//!
//! Charges every linked recurring deposit for the months it has fallen
//! behind, then exits. Meant to be run daily from cron or a scheduler.
//!
//! # Usage
//!
//! ```bash
//! TRACKER_DATABASE_URL=postgres://... TRACKER_TIMEZONE=Asia/Kolkata cargo run --bin deposit-sweep
//! ```
//!
//! Exits with an error when any deposit failed to reconcile.

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{info, warn};

use domain_deposit::DepositPort;
use infra_db::{create_pool, run_migrations, PostgresDepositAdapter};
use interface_worker::{run_sweep, telemetry::init_tracing, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = WorkerConfig::from_env().context("loading configuration")?;
    init_tracing(&config.log_level)?;

    let today = config.timezone.today();
    info!(
        timezone = config.timezone.0.name(),
        %today,
        max_connections = config.max_connections,
        "Starting deposit sweep"
    );

    let pool = create_pool(config.database_config())
        .await
        .context("connecting to database")?;
    run_migrations(&pool).await.context("running migrations")?;

    let port: Arc<dyn DepositPort> = Arc::new(PostgresDepositAdapter::new(pool.clone()));

    let report = tokio::select! {
        report = run_sweep(port, config.service_settings(), today) => report?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Received Ctrl+C, stopping sweep");
            pool.close().await;
            bail!("sweep interrupted");
        }
    };

    pool.close().await;

    if !report.is_clean() {
        bail!("{} of {} deposits failed to reconcile", report.failed.len(), report.examined);
    }
    info!("Deposit sweep finished");
    Ok(())
}
