//! Recurring deposit catch-up deductions
//!
//! A recurring deposit charges its installment to the linked savings account
//! once per calendar month. Deductions are not driven by a clock: whenever the
//! schedule is reconciled, every month between the first unprocessed period
//! and the current (or maturity) month is charged in one batch, and the
//! deposit's watermark moves to the last charged month.
//!
//! ```text
//!   watermark        anchor                          ceiling
//!       │              │                                │
//!   ────●──────────────●────────●────────●──────────────●────
//!     Jan            Feb       Mar      Apr            May
//!                      └──────── 4 installments ────────┘
//! ```
//!
//! [`reconcile`] is pure: it takes value snapshots and returns the updated
//! copies, leaving persistence to the caller. Reconciling twice with the same
//! `today` charges nothing the second time.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{checked_scale, first_of_month, months_between, next_period, AccountId};
use crate::account::SavingsAccount;
use crate::deposit::Deposit;
use crate::error::DepositError;

/// Updated records produced by a reconciliation that charged installments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeductionBatch {
    /// Deposit with the advanced watermark
    pub deposit: Deposit,
    /// Account with the reduced balance
    pub account: SavingsAccount,
    /// Number of monthly installments charged
    pub installments: u32,
    /// `installments * amount`
    pub total_deducted: Decimal,
    /// First month charged in this batch
    pub first_period: NaiveDate,
    /// Last month charged, the new watermark
    pub last_period: NaiveDate,
}

/// Outcome of reconciling one deposit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reconciliation {
    /// Fixed deposit, nothing is scheduled
    NotRecurring,
    /// Recurring deposit without a linked account
    NotLinked,
    /// The linked account could not be resolved
    LinkedAccountMissing { account_id: AccountId },
    /// Every due month has already been charged
    UpToDate,
    /// One or more installments were charged
    Applied(DeductionBatch),
}

impl Reconciliation {
    pub fn installments_applied(&self) -> u32 {
        match self {
            Reconciliation::Applied(batch) => batch.installments,
            _ => 0,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Reconciliation::Applied(_))
    }
}

/// The first month that has not been charged yet
///
/// # Errors
///
/// Returns `DepositError::Calculation` if the watermark is the last
/// representable month
pub fn first_unprocessed_period(deposit: &Deposit) -> Result<NaiveDate, DepositError> {
    match deposit.last_processed_period {
        Some(watermark) => Ok(next_period(watermark)?),
        None => Ok(first_of_month(deposit.effective_start_date())),
    }
}

/// The last month that may be charged as of `today`
pub fn last_chargeable_period(deposit: &Deposit, today: NaiveDate) -> NaiveDate {
    first_of_month(today.min(deposit.maturity_date))
}

/// Charges every installment due on `deposit` as of `today`
///
/// `account` is the resolved linked account, if any. An account with a
/// different id or owner than the deposit's link counts as missing.
///
/// # Errors
///
/// * `DepositError::InvalidDeposit` - a recurring deposit with a non-positive
///   installment
/// * `DepositError::Calculation` - the total or the new balance overflows
///
/// # Example
///
/// ```rust,ignore
/// let outcome = reconcile(&deposit, Some(&account), today)?;
/// if let Reconciliation::Applied(batch) = outcome {
///     port.commit_deduction(&batch.deposit, &batch.account).await?;
/// }
/// ```
pub fn reconcile(
    deposit: &Deposit,
    account: Option<&SavingsAccount>,
    today: NaiveDate,
) -> Result<Reconciliation, DepositError> {
    if !deposit.is_recurring() {
        return Ok(Reconciliation::NotRecurring);
    }
    let Some(account_id) = deposit.linked_account_id else {
        return Ok(Reconciliation::NotLinked);
    };
    let account = match account {
        Some(account) if account.id == account_id && account.user_id == deposit.user_id => account,
        _ => return Ok(Reconciliation::LinkedAccountMissing { account_id }),
    };
    if deposit.amount <= Decimal::ZERO {
        return Err(DepositError::InvalidDeposit(format!(
            "installment of {} must be positive",
            deposit.amount
        )));
    }

    let anchor = first_unprocessed_period(deposit)?;
    let ceiling = last_chargeable_period(deposit, today);
    if anchor > ceiling {
        return Ok(Reconciliation::UpToDate);
    }

    let installments = u32::try_from(months_between(anchor, ceiling) + 1)
        .map_err(|_| DepositError::Calculation("installment count out of range".to_string()))?;
    let total_deducted = checked_scale(deposit.amount, installments)?;

    let mut account = account.clone();
    account.debit(total_deducted, today)?;

    let mut deposit = deposit.clone();
    deposit.last_processed_period = Some(ceiling);
    deposit.updated_at = today;

    Ok(Reconciliation::Applied(DeductionBatch {
        deposit,
        account,
        installments,
        total_deducted,
        first_period: anchor,
        last_period: ceiling,
    }))
}
