//! Batch deduction sweep
//!
//! One pass charges every linked recurring deposit for the months it has
//! fallen behind. Each deposit is committed on its own, so an interrupted
//! sweep leaves already reconciled deposits in place and the next run picks
//! up the rest.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument, warn};

use domain_deposit::{DepositPort, DepositService, DepositServiceSettings, SweepReport};

use crate::error::WorkerError;

/// Runs one sweep over the given store
#[instrument(skip(port, settings), fields(today = %today))]
pub async fn run_sweep(
    port: Arc<dyn DepositPort>,
    settings: DepositServiceSettings,
    today: NaiveDate,
) -> Result<SweepReport, WorkerError> {
    let service = DepositService::with_settings(port, settings);
    let report = service.reconcile_all(today).await?;

    for issue in &report.skipped {
        warn!(deposit_id = %issue.deposit_id, reason = %issue.reason, "Deposit skipped");
    }
    for issue in &report.failed {
        warn!(deposit_id = %issue.deposit_id, reason = %issue.reason, "Deposit failed");
    }
    info!(
        examined = report.examined,
        charged_deposits = report.applied.len(),
        installments = report.installments(),
        "Sweep complete"
    );
    Ok(report)
}
