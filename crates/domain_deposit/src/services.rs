//! Deposit domain services
//!
//! `DepositService` loads records through a [`DepositPort`], runs the pure
//! opening and reconciliation rules, and stores the results. Every write is
//! version-checked; a conflicted load-compute-commit cycle is repeated from
//! fresh state up to [`ConflictRetry::max_attempts`] times.
//!
//! Listing a user's deposits reconciles each linked recurring deposit first,
//! so the returned records and balances already include every installment
//! due as of `today`. [`DepositService::reconcile_all`] does the same for
//! every user in one sweep.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use core_kernel::{AccountId, ConflictRetry, DepositId, ExpenseId, IncomeId, PortError, UserId};

use crate::account::{AccountChanges, OpenAccount, SavingsAccount};
use crate::cashflow::{Expense, Income, RecordExpense, RecordIncome};
use crate::deposit::{CreateDeposit, Deposit, DepositChanges};
use crate::error::DepositError;
use crate::opening;
use crate::ports::DepositPort;
use crate::schedule::{reconcile, Reconciliation};

/// What to do when a deposit's linked account cannot be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingAccountPolicy {
    /// Log a warning, report the deposit as skipped and carry on
    #[default]
    Warn,
    /// Fail with `DepositError::LinkedAccountNotFound`
    Fail,
}

/// Service tuning knobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositServiceSettings {
    pub retry: ConflictRetry,
    pub missing_account: MissingAccountPolicy,
}

/// Installments charged to one deposit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeductionSummary {
    pub deposit_id: DepositId,
    pub account_id: AccountId,
    pub installments: u32,
    pub total_deducted: Decimal,
    pub first_period: NaiveDate,
    pub last_period: NaiveDate,
}

/// A deposit that could not be reconciled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeductionIssue {
    pub deposit_id: DepositId,
    pub account_id: Option<AccountId>,
    pub reason: String,
}

/// A user's deposits after read-triggered reconciliation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepositOverview {
    pub deposits: Vec<Deposit>,
    pub applied: Vec<DeductionSummary>,
    pub skipped: Vec<DeductionIssue>,
}

impl DepositOverview {
    pub fn total_deducted(&self) -> Decimal {
        self.applied.iter().map(|a| a.total_deducted).sum()
    }
}

/// Result of one sweep over all linked recurring deposits
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReport {
    /// Deposits looked at
    pub examined: usize,
    pub applied: Vec<DeductionSummary>,
    /// Deposits whose linked account is missing
    pub skipped: Vec<DeductionIssue>,
    /// Deposits whose reconciliation failed
    pub failed: Vec<DeductionIssue>,
}

impl SweepReport {
    pub fn installments(&self) -> u32 {
        self.applied.iter().map(|a| a.installments).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

enum Reconciled {
    Applied(Deposit, DeductionSummary),
    Unchanged(Deposit),
    AccountMissing(Deposit, AccountId),
}

/// Service for deposits, savings accounts and cash flow entries
pub struct DepositService {
    port: Arc<dyn DepositPort>,
    settings: DepositServiceSettings,
}

impl DepositService {
    /// Creates a service with default settings
    pub fn new(port: Arc<dyn DepositPort>) -> Self {
        Self::with_settings(port, DepositServiceSettings::default())
    }

    pub fn with_settings(port: Arc<dyn DepositPort>, settings: DepositServiceSettings) -> Self {
        Self { port, settings }
    }

    pub fn settings(&self) -> &DepositServiceSettings {
        &self.settings
    }

    // ========================================================================
    // Deposits
    // ========================================================================

    /// Opens a deposit, charging the first installment when it is due
    ///
    /// # Errors
    ///
    /// * `DepositError::InvalidDeposit` - the request fails validation
    /// * `DepositError::LinkedAccountNotFound` - the linked account is missing
    ///   or belongs to another user
    /// * `DepositError::ConcurrentModification` - the linked account kept
    ///   changing while the first installment was charged
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn open_deposit(
        &self,
        user_id: UserId,
        request: CreateDeposit,
        today: NaiveDate,
    ) -> Result<Deposit, DepositError> {
        request
            .validate()
            .map_err(|e| DepositError::InvalidDeposit(e.to_string()))?;
        let deposit = request.into_deposit(user_id, today);

        let mut attempt = 1;
        loop {
            let account = match deposit.linked_account_id {
                Some(account_id) => self.resolve_account(account_id).await?,
                None => None,
            };
            let opened = opening::open_deposit(deposit.clone(), account, today)?;

            match self
                .port
                .insert_deposit(&opened.deposit, opened.debited_account.as_ref())
                .await
            {
                Ok(stored) => {
                    info!(
                        deposit_id = %stored.id,
                        kind = stored.kind.code(),
                        first_installment = opened.charged_first_installment(),
                        "Deposit opened"
                    );
                    return Ok(stored);
                }
                Err(err) => self.conflict_or_fail(err, attempt, "open deposit")?,
            }
            attempt += 1;
        }
    }

    /// Retrieves one of the user's deposits
    #[instrument(skip(self), fields(user_id = %user_id, deposit_id = %id))]
    pub async fn get_deposit(&self, user_id: UserId, id: DepositId) -> Result<Deposit, DepositError> {
        let deposit = self.load_deposit(id).await?;
        ensure_owner(user_id, deposit.user_id, "Deposit", id)?;
        Ok(deposit)
    }

    /// Lists the user's deposits, charging every installment due first
    ///
    /// # Errors
    ///
    /// Fails if a reconciliation fails, or if a linked account is missing and
    /// the policy is [`MissingAccountPolicy::Fail`].
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_deposits(
        &self,
        user_id: UserId,
        today: NaiveDate,
    ) -> Result<DepositOverview, DepositError> {
        let listed = self.port.list_deposits(user_id).await?;
        let mut overview = DepositOverview::default();

        for deposit in listed {
            if !deposit.is_scheduled() {
                overview.deposits.push(deposit);
                continue;
            }
            match self.reconcile_one(deposit, today).await? {
                Reconciled::Applied(deposit, summary) => {
                    overview.deposits.push(deposit);
                    overview.applied.push(summary);
                }
                Reconciled::Unchanged(deposit) => overview.deposits.push(deposit),
                Reconciled::AccountMissing(deposit, account_id) => {
                    overview.skipped.push(self.missing_account(&deposit, account_id)?);
                    overview.deposits.push(deposit);
                }
            }
        }

        debug!(
            count = overview.deposits.len(),
            applied = overview.applied.len(),
            "Listed deposits"
        );
        Ok(overview)
    }

    /// Replaces a deposit's editable fields, keeping its watermark
    #[instrument(skip(self, changes), fields(user_id = %user_id, deposit_id = %id))]
    pub async fn update_deposit(
        &self,
        user_id: UserId,
        id: DepositId,
        changes: DepositChanges,
        today: NaiveDate,
    ) -> Result<Deposit, DepositError> {
        changes
            .validate()
            .map_err(|e| DepositError::InvalidDeposit(e.to_string()))?;

        let mut attempt = 1;
        loop {
            let mut deposit = self.get_deposit(user_id, id).await?;
            deposit.apply_changes(changes.clone(), today);
            deposit.validate()?;
            if let Some(account_id) = deposit.linked_account_id {
                match self.resolve_account(account_id).await? {
                    Some(account) if account.user_id == user_id => {}
                    _ => return Err(DepositError::LinkedAccountNotFound(account_id.to_string())),
                }
            }

            match self.port.update_deposit(&deposit).await {
                Ok(stored) => {
                    info!(version = stored.version, "Deposit updated");
                    return Ok(stored);
                }
                Err(err) => self.conflict_or_fail(err, attempt, "update deposit")?,
            }
            attempt += 1;
        }
    }

    /// Deletes one of the user's deposits
    #[instrument(skip(self), fields(user_id = %user_id, deposit_id = %id))]
    pub async fn delete_deposit(&self, user_id: UserId, id: DepositId) -> Result<(), DepositError> {
        self.get_deposit(user_id, id).await?;
        self.port.delete_deposit(id).await.map_err(|e| deposit_port_error(e, id))?;
        info!("Deposit deleted");
        Ok(())
    }

    /// Reconciles every linked recurring deposit of every user
    ///
    /// Failures of individual deposits are reported in the [`SweepReport`]
    /// and do not stop the sweep. Only a failure to list deposits is returned
    /// as an error.
    #[instrument(skip(self))]
    pub async fn reconcile_all(&self, today: NaiveDate) -> Result<SweepReport, DepositError> {
        let deposits = self.port.list_linked_recurring().await?;
        let mut report = SweepReport {
            examined: deposits.len(),
            ..SweepReport::default()
        };

        for deposit in deposits {
            let deposit_id = deposit.id;
            let account_id = deposit.linked_account_id;
            match self.reconcile_one(deposit, today).await {
                Ok(Reconciled::Applied(_, summary)) => report.applied.push(summary),
                Ok(Reconciled::Unchanged(_)) => {}
                Ok(Reconciled::AccountMissing(deposit, account_id)) => {
                    match self.missing_account(&deposit, account_id) {
                        Ok(issue) => report.skipped.push(issue),
                        Err(err) => report.failed.push(DeductionIssue {
                            deposit_id,
                            account_id: Some(account_id),
                            reason: err.to_string(),
                        }),
                    }
                }
                Err(err) => {
                    warn!(deposit_id = %deposit_id, error = %err, "Reconciliation failed");
                    report.failed.push(DeductionIssue {
                        deposit_id,
                        account_id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(
            examined = report.examined,
            applied = report.applied.len(),
            installments = report.installments(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Deduction sweep finished"
        );
        Ok(report)
    }

    // ========================================================================
    // Savings accounts
    // ========================================================================

    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn open_account(
        &self,
        user_id: UserId,
        request: OpenAccount,
        today: NaiveDate,
    ) -> Result<SavingsAccount, DepositError> {
        request
            .validate()
            .map_err(|e| DepositError::InvalidAccount(e.to_string()))?;
        let account = request.into_account(user_id, today);
        account.validate()?;

        let stored = self.port.insert_account(&account).await?;
        info!(account_id = %stored.id, "Savings account opened");
        Ok(stored)
    }

    #[instrument(skip(self), fields(user_id = %user_id, account_id = %id))]
    pub async fn get_account(&self, user_id: UserId, id: AccountId) -> Result<SavingsAccount, DepositError> {
        let account = self
            .port
            .get_account(id)
            .await
            .map_err(|e| account_port_error(e, id))?;
        ensure_owner(user_id, account.user_id, "SavingsAccount", id)?;
        Ok(account)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_accounts(&self, user_id: UserId) -> Result<Vec<SavingsAccount>, DepositError> {
        Ok(self.port.list_accounts(user_id).await?)
    }

    /// Replaces an account's editable fields
    ///
    /// The balance is set to the given value. A version conflict reloads the
    /// account and applies the same changes again.
    #[instrument(skip(self, changes), fields(user_id = %user_id, account_id = %id))]
    pub async fn update_account(
        &self,
        user_id: UserId,
        id: AccountId,
        changes: AccountChanges,
        today: NaiveDate,
    ) -> Result<SavingsAccount, DepositError> {
        changes
            .validate()
            .map_err(|e| DepositError::InvalidAccount(e.to_string()))?;

        let mut attempt = 1;
        loop {
            let mut account = self.get_account(user_id, id).await?;
            account.apply_changes(changes.clone(), today);
            account.validate()?;

            match self.port.update_account(&account).await {
                Ok(stored) => {
                    info!(version = stored.version, "Savings account updated");
                    return Ok(stored);
                }
                Err(err) => self.conflict_or_fail(err, attempt, "update account")?,
            }
            attempt += 1;
        }
    }

    #[instrument(skip(self), fields(user_id = %user_id, account_id = %id))]
    pub async fn delete_account(&self, user_id: UserId, id: AccountId) -> Result<(), DepositError> {
        self.get_account(user_id, id).await?;
        self.port.delete_account(id).await.map_err(|e| account_port_error(e, id))?;
        info!("Savings account deleted");
        Ok(())
    }

    // ========================================================================
    // Expenses and income
    // ========================================================================

    /// Records an expense, debiting the account it was paid from
    ///
    /// # Errors
    ///
    /// * `DepositError::InvalidExpense` - the request fails validation
    /// * `DepositError::LinkedAccountNotFound` - the paying account is missing
    ///   or belongs to another user
    /// * `DepositError::ConcurrentModification` - the account kept changing
    ///   while it was debited
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn record_expense(
        &self,
        user_id: UserId,
        request: RecordExpense,
        today: NaiveDate,
    ) -> Result<Expense, DepositError> {
        request
            .validate()
            .map_err(|e| DepositError::InvalidExpense(e.to_string()))?;
        let expense = request.into_expense(user_id, today);
        expense.validate()?;

        let mut attempt = 1;
        loop {
            let debited = match expense.account_id {
                Some(account_id) => {
                    let mut account = match self.resolve_account(account_id).await? {
                        Some(account) if account.user_id == user_id => account,
                        _ => return Err(DepositError::LinkedAccountNotFound(account_id.to_string())),
                    };
                    account.debit(expense.amount, today)?;
                    Some(account)
                }
                None => None,
            };

            match self.port.insert_expense(&expense, debited.as_ref()).await {
                Ok(stored) => {
                    info!(
                        expense_id = %stored.id,
                        amount = %stored.amount,
                        debited = debited.is_some(),
                        "Expense recorded"
                    );
                    return Ok(stored);
                }
                Err(err) => self.conflict_or_fail(err, attempt, "record expense")?,
            }
            attempt += 1;
        }
    }

    #[instrument(skip(self), fields(user_id = %user_id, expense_id = %id))]
    pub async fn get_expense(&self, user_id: UserId, id: ExpenseId) -> Result<Expense, DepositError> {
        let expense = self
            .port
            .get_expense(id)
            .await
            .map_err(|e| expense_port_error(e, id))?;
        ensure_owner(user_id, expense.user_id, "Expense", id)?;
        Ok(expense)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_expenses(&self, user_id: UserId) -> Result<Vec<Expense>, DepositError> {
        Ok(self.port.list_expenses(user_id).await?)
    }

    /// Deletes an expense, crediting the amount back to its account
    ///
    /// An account that no longer exists, or no longer belongs to the user,
    /// gets no refund and the expense is deleted anyway.
    #[instrument(skip(self), fields(user_id = %user_id, expense_id = %id))]
    pub async fn delete_expense(
        &self,
        user_id: UserId,
        id: ExpenseId,
        today: NaiveDate,
    ) -> Result<(), DepositError> {
        let mut attempt = 1;
        loop {
            let expense = self.get_expense(user_id, id).await?;
            let refunded = match expense.account_id {
                Some(account_id) => match self.resolve_account(account_id).await? {
                    Some(mut account) if account.user_id == user_id => {
                        account.credit(expense.amount, today)?;
                        Some(account)
                    }
                    _ => {
                        warn!(account_id = %account_id, "Paying account is gone, deleting expense without refund");
                        None
                    }
                },
                None => None,
            };

            match self.port.delete_expense(id, refunded.as_ref()).await {
                Ok(()) => {
                    info!(refunded = refunded.is_some(), "Expense deleted");
                    return Ok(());
                }
                Err(err) if err.is_not_found() => return Err(DepositError::ExpenseNotFound(id.to_string())),
                Err(err) => self.conflict_or_fail(err, attempt, "delete expense")?,
            }
            attempt += 1;
        }
    }

    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn record_income(
        &self,
        user_id: UserId,
        request: RecordIncome,
        today: NaiveDate,
    ) -> Result<Income, DepositError> {
        request
            .validate()
            .map_err(|e| DepositError::InvalidIncome(e.to_string()))?;
        let stored = self.port.insert_income(&request.into_income(user_id, today)).await?;
        info!(income_id = %stored.id, amount = %stored.amount, "Income recorded");
        Ok(stored)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_incomes(&self, user_id: UserId) -> Result<Vec<Income>, DepositError> {
        Ok(self.port.list_incomes(user_id).await?)
    }

    #[instrument(skip(self), fields(user_id = %user_id, income_id = %id))]
    pub async fn delete_income(&self, user_id: UserId, id: IncomeId) -> Result<(), DepositError> {
        let income = self
            .port
            .get_income(id)
            .await
            .map_err(|e| income_port_error(e, id))?;
        ensure_owner(user_id, income.user_id, "Income", id)?;
        self.port.delete_income(id).await.map_err(|e| income_port_error(e, id))?;
        info!("Income deleted");
        Ok(())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn load_deposit(&self, id: DepositId) -> Result<Deposit, DepositError> {
        self.port
            .get_deposit(id)
            .await
            .map_err(|e| deposit_port_error(e, id))
    }

    /// Loads an account, mapping a missing record to `None`
    async fn resolve_account(&self, id: AccountId) -> Result<Option<SavingsAccount>, DepositError> {
        match self.port.get_account(id).await {
            Ok(account) => Ok(Some(account)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Reconciles one deposit and commits the result
    ///
    /// The first attempt uses the given snapshot; retries reload it.
    async fn reconcile_one(&self, mut deposit: Deposit, today: NaiveDate) -> Result<Reconciled, DepositError> {
        let mut attempt = 1;
        loop {
            let account = match deposit.linked_account_id {
                Some(account_id) => self.resolve_account(account_id).await?,
                None => None,
            };

            let batch = match reconcile(&deposit, account.as_ref(), today)? {
                Reconciliation::NotRecurring | Reconciliation::NotLinked | Reconciliation::UpToDate => {
                    return Ok(Reconciled::Unchanged(deposit));
                }
                Reconciliation::LinkedAccountMissing { account_id } => {
                    return Ok(Reconciled::AccountMissing(deposit, account_id));
                }
                Reconciliation::Applied(batch) => batch,
            };

            match self.port.commit_deduction(&batch.deposit, &batch.account).await {
                Ok((stored, account)) => {
                    info!(
                        deposit_id = %stored.id,
                        account_id = %account.id,
                        installments = batch.installments,
                        total = %batch.total_deducted,
                        watermark = %batch.last_period,
                        "Recurring deposit installments deducted"
                    );
                    let summary = DeductionSummary {
                        deposit_id: stored.id,
                        account_id: account.id,
                        installments: batch.installments,
                        total_deducted: batch.total_deducted,
                        first_period: batch.first_period,
                        last_period: batch.last_period,
                    };
                    return Ok(Reconciled::Applied(stored, summary));
                }
                Err(err) => self.conflict_or_fail(err, attempt, "commit deduction")?,
            }

            attempt += 1;
            deposit = self.load_deposit(deposit.id).await?;
        }
    }

    /// Swallows a conflict that may be retried; everything else is returned
    fn conflict_or_fail(&self, err: PortError, attempt: u32, operation: &str) -> Result<(), DepositError> {
        if !err.is_conflict() {
            return Err(err.into());
        }
        if self.settings.retry.allows_retry_after(attempt) {
            debug!(attempt, operation, "Version conflict, retrying");
            return Ok(());
        }
        warn!(attempt, operation, "Version conflict persisted, giving up");
        Err(DepositError::ConcurrentModification(format!(
            "{} failed after {} attempts: {}",
            operation, attempt, err
        )))
    }

    fn missing_account(&self, deposit: &Deposit, account_id: AccountId) -> Result<DeductionIssue, DepositError> {
        match self.settings.missing_account {
            MissingAccountPolicy::Warn => {
                warn!(
                    deposit_id = %deposit.id,
                    account_id = %account_id,
                    "Linked savings account not found, skipping deduction"
                );
                Ok(DeductionIssue {
                    deposit_id: deposit.id,
                    account_id: Some(account_id),
                    reason: "linked savings account not found".to_string(),
                })
            }
            MissingAccountPolicy::Fail => Err(DepositError::LinkedAccountNotFound(account_id.to_string())),
        }
    }
}

fn ensure_owner(
    user_id: UserId,
    owner: UserId,
    entity: &'static str,
    id: impl std::fmt::Display,
) -> Result<(), DepositError> {
    if user_id == owner {
        Ok(())
    } else {
        Err(DepositError::NotOwned {
            entity,
            id: id.to_string(),
        })
    }
}

fn deposit_port_error(err: PortError, id: DepositId) -> DepositError {
    if err.is_not_found() {
        DepositError::DepositNotFound(id.to_string())
    } else {
        err.into()
    }
}

fn account_port_error(err: PortError, id: AccountId) -> DepositError {
    if err.is_not_found() {
        DepositError::AccountNotFound(id.to_string())
    } else {
        err.into()
    }
}

fn expense_port_error(err: PortError, id: ExpenseId) -> DepositError {
    if err.is_not_found() {
        DepositError::ExpenseNotFound(id.to_string())
    } else {
        err.into()
    }
}

fn income_port_error(err: PortError, id: IncomeId) -> DepositError {
    if err.is_not_found() {
        DepositError::IncomeNotFound(id.to_string())
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deposit::DepositKind;
    use crate::ports::mock::MockDepositPort;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Fixture {
        port: Arc<MockDepositPort>,
        service: DepositService,
        user: UserId,
        account: SavingsAccount,
        deposit: Deposit,
    }

    /// A recurring deposit of 500/month from 2024-01-01, never reconciled,
    /// linked to an account holding 10000
    async fn fixture(settings: DepositServiceSettings) -> Fixture {
        let user = UserId::new();
        let account = SavingsAccount::new(user, "HDFC", dec!(10000), date(2023, 12, 1));
        let deposit = Deposit::recurring(user, "HDFC", dec!(500), date(2030, 1, 1), date(2024, 1, 1))
            .with_start_date(date(2024, 1, 1))
            .linked_to(account.id);
        let port = Arc::new(
            MockDepositPort::with_records(vec![account.clone()], vec![deposit.clone()]).await,
        );
        let service = DepositService::with_settings(port.clone(), settings);
        Fixture { port, service, user, account, deposit }
    }

    fn create_request(account_id: Option<AccountId>, start: Option<NaiveDate>) -> CreateDeposit {
        CreateDeposit {
            bank_name: "ICICI".to_string(),
            kind: DepositKind::Recurring,
            amount: dec!(300),
            interest_rate: dec!(6.8),
            start_date: start,
            maturity_date: date(2026, 12, 31),
            linked_account_id: account_id,
        }
    }

    #[tokio::test]
    async fn test_list_applies_catch_up() {
        let f = fixture(DepositServiceSettings::default()).await;

        let overview = f.service.list_deposits(f.user, date(2024, 4, 15)).await.unwrap();

        assert_eq!(overview.applied.len(), 1);
        assert_eq!(overview.applied[0].installments, 4);
        assert_eq!(overview.total_deducted(), dec!(2000));
        assert_eq!(overview.deposits[0].last_processed_period, Some(date(2024, 4, 1)));

        let account = f.port.get_account(f.account.id).await.unwrap();
        assert_eq!(account.balance, dec!(8000));
    }

    #[tokio::test]
    async fn test_second_list_charges_nothing() {
        let f = fixture(DepositServiceSettings::default()).await;
        let today = date(2024, 4, 15);

        f.service.list_deposits(f.user, today).await.unwrap();
        let overview = f.service.list_deposits(f.user, today).await.unwrap();

        assert!(overview.applied.is_empty());
        assert_eq!(f.port.get_account(f.account.id).await.unwrap().balance, dec!(8000));
    }

    #[tokio::test]
    async fn test_conflict_is_retried() {
        let f = fixture(DepositServiceSettings::default()).await;
        f.port.inject_commit_conflicts(2);

        let overview = f.service.list_deposits(f.user, date(2024, 4, 15)).await.unwrap();

        assert_eq!(overview.applied[0].installments, 4);
        assert_eq!(f.port.get_account(f.account.id).await.unwrap().balance, dec!(8000));
    }

    #[tokio::test]
    async fn test_persistent_conflict_leaves_state_unchanged() {
        let f = fixture(DepositServiceSettings::default()).await;
        f.port.inject_commit_conflicts(3);

        let err = f.service.list_deposits(f.user, date(2024, 4, 15)).await.unwrap_err();

        assert!(matches!(err, DepositError::ConcurrentModification(_)));
        let deposit = f.port.get_deposit(f.deposit.id).await.unwrap();
        assert_eq!(deposit.last_processed_period, None);
        assert_eq!(f.port.get_account(f.account.id).await.unwrap().balance, dec!(10000));
    }

    #[tokio::test]
    async fn test_store_failure_is_not_retried() {
        let f = fixture(DepositServiceSettings::default()).await;
        f.port.inject_commit_failures(1);

        let err = f.service.list_deposits(f.user, date(2024, 4, 15)).await.unwrap_err();
        assert!(matches!(err, DepositError::Port(_)));
        assert_eq!(f.port.get_account(f.account.id).await.unwrap().balance, dec!(10000));
    }

    #[tokio::test]
    async fn test_missing_account_warns_by_default() {
        let f = fixture(DepositServiceSettings::default()).await;
        f.port.delete_account(f.account.id).await.unwrap();

        let overview = f.service.list_deposits(f.user, date(2024, 4, 15)).await.unwrap();

        assert!(overview.applied.is_empty());
        assert_eq!(overview.skipped.len(), 1);
        assert_eq!(overview.deposits.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_account_fails_when_configured() {
        let settings = DepositServiceSettings {
            missing_account: MissingAccountPolicy::Fail,
            ..Default::default()
        };
        let f = fixture(settings).await;
        f.port.delete_account(f.account.id).await.unwrap();

        let err = f.service.list_deposits(f.user, date(2024, 4, 15)).await.unwrap_err();
        assert!(matches!(err, DepositError::LinkedAccountNotFound(_)));
    }

    #[tokio::test]
    async fn test_foreign_deposit_is_not_owned() {
        let f = fixture(DepositServiceSettings::default()).await;
        let err = f.service.get_deposit(UserId::new(), f.deposit.id).await.unwrap_err();
        assert!(matches!(err, DepositError::NotOwned { entity: "Deposit", .. }));

        let err = f.service.delete_account(UserId::new(), f.account.id).await.unwrap_err();
        assert!(matches!(err, DepositError::NotOwned { .. }));
    }

    #[tokio::test]
    async fn test_open_charges_first_installment() {
        let f = fixture(DepositServiceSettings::default()).await;
        let today = date(2024, 5, 20);

        let deposit = f
            .service
            .open_deposit(f.user, create_request(Some(f.account.id), None), today)
            .await
            .unwrap();

        assert_eq!(deposit.last_processed_period, Some(date(2024, 5, 1)));
        assert_eq!(f.port.get_account(f.account.id).await.unwrap().balance, dec!(9700));
    }

    #[tokio::test]
    async fn test_open_with_future_start_defers_charge() {
        let f = fixture(DepositServiceSettings::default()).await;

        let deposit = f
            .service
            .open_deposit(f.user, create_request(Some(f.account.id), Some(date(2024, 8, 1))), date(2024, 5, 20))
            .await
            .unwrap();

        assert_eq!(deposit.last_processed_period, None);
        assert_eq!(f.port.get_account(f.account.id).await.unwrap().balance, dec!(10000));
    }

    #[tokio::test]
    async fn test_open_rejects_foreign_account() {
        let f = fixture(DepositServiceSettings::default()).await;
        let err = f
            .service
            .open_deposit(UserId::new(), create_request(Some(f.account.id), None), date(2024, 5, 20))
            .await
            .unwrap_err();
        assert!(matches!(err, DepositError::LinkedAccountNotFound(_)));
    }

    #[tokio::test]
    async fn test_update_preserves_watermark() {
        let f = fixture(DepositServiceSettings::default()).await;
        let today = date(2024, 4, 15);
        f.service.list_deposits(f.user, today).await.unwrap();

        let changes = DepositChanges {
            bank_name: "HDFC Bank".to_string(),
            kind: DepositKind::Recurring,
            amount: dec!(750),
            interest_rate: dec!(7.1),
            start_date: Some(date(2024, 1, 1)),
            maturity_date: date(2030, 1, 1),
            linked_account_id: Some(f.account.id),
        };
        let updated = f.service.update_deposit(f.user, f.deposit.id, changes, today).await.unwrap();

        assert_eq!(updated.bank_name, "HDFC Bank");
        assert_eq!(updated.last_processed_period, Some(date(2024, 4, 1)));
    }

    fn changes_for(f: &Fixture, start: NaiveDate, maturity: NaiveDate) -> DepositChanges {
        DepositChanges {
            bank_name: f.deposit.bank_name.clone(),
            kind: DepositKind::Recurring,
            amount: f.deposit.amount,
            interest_rate: f.deposit.interest_rate,
            start_date: Some(start),
            maturity_date: maturity,
            linked_account_id: Some(f.account.id),
        }
    }

    #[tokio::test]
    async fn test_update_cannot_mature_before_charged_months() {
        let f = fixture(DepositServiceSettings::default()).await;
        let today = date(2024, 6, 15);
        f.service.list_deposits(f.user, today).await.unwrap();

        let changes = changes_for(&f, date(2024, 1, 1), date(2024, 2, 10));
        let err = f.service.update_deposit(f.user, f.deposit.id, changes, today).await.unwrap_err();

        assert!(matches!(err, DepositError::InvalidDeposit(_)));
        let stored = f.port.get_deposit(f.deposit.id).await.unwrap();
        assert_eq!(stored.maturity_date, date(2030, 1, 1));
        assert_eq!(stored.last_processed_period, Some(date(2024, 6, 1)));
        assert_eq!(f.port.get_account(f.account.id).await.unwrap().balance, dec!(7000));
    }

    #[tokio::test]
    async fn test_update_cannot_start_after_charged_months() {
        let f = fixture(DepositServiceSettings::default()).await;
        let today = date(2024, 6, 15);
        f.service.list_deposits(f.user, today).await.unwrap();

        let changes = changes_for(&f, date(2024, 9, 1), date(2030, 1, 1));
        let err = f.service.update_deposit(f.user, f.deposit.id, changes, today).await.unwrap_err();

        assert!(matches!(err, DepositError::InvalidDeposit(_)));
        assert_eq!(f.port.get_deposit(f.deposit.id).await.unwrap().start_date, Some(date(2024, 1, 1)));
    }

    #[tokio::test]
    async fn test_sweep_report() {
        let f = fixture(DepositServiceSettings::default()).await;
        let orphan = Deposit::recurring(f.user, "Axis", dec!(100), date(2030, 1, 1), date(2024, 1, 1))
            .linked_to(AccountId::new());
        f.port.insert_deposit(&orphan, None).await.unwrap();

        let report = f.service.reconcile_all(date(2024, 4, 15)).await.unwrap();

        assert_eq!(report.examined, 2);
        assert_eq!(report.installments(), 4);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].deposit_id, orphan.id);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_account_balance_edit_is_absolute() {
        let f = fixture(DepositServiceSettings::default()).await;
        let changes = AccountChanges {
            bank_name: "HDFC".to_string(),
            account_number: Some("00112233".to_string()),
            balance: dec!(42),
            interest_rate: dec!(3),
        };
        let updated = f
            .service
            .update_account(f.user, f.account.id, changes, date(2024, 2, 1))
            .await
            .unwrap();
        assert_eq!(updated.balance, dec!(42));
        assert_eq!(updated.version, f.account.version + 1);
    }

    fn expense_request(amount: Decimal, account_id: Option<AccountId>) -> RecordExpense {
        RecordExpense {
            category: "Groceries".to_string(),
            amount,
            spent_on: date(2024, 3, 2),
            description: None,
            account_id,
        }
    }

    #[tokio::test]
    async fn test_expense_debits_then_refunds_on_delete() {
        let f = fixture(DepositServiceSettings::default()).await;
        let today = date(2024, 3, 2);

        let expense = f
            .service
            .record_expense(f.user, expense_request(dec!(1250.40), Some(f.account.id)), today)
            .await
            .unwrap();
        assert_eq!(f.port.get_account(f.account.id).await.unwrap().balance, dec!(8749.60));

        f.service.delete_expense(f.user, expense.id, date(2024, 3, 9)).await.unwrap();

        let account = f.port.get_account(f.account.id).await.unwrap();
        assert_eq!(account.balance, dec!(10000));
        assert_eq!(account.updated_at, date(2024, 3, 9));
        assert!(f.service.list_expenses(f.user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expense_without_account_leaves_balances() {
        let f = fixture(DepositServiceSettings::default()).await;
        let expense = f
            .service
            .record_expense(f.user, expense_request(dec!(60), None), date(2024, 3, 2))
            .await
            .unwrap();
        f.service.delete_expense(f.user, expense.id, date(2024, 3, 2)).await.unwrap();

        assert_eq!(f.port.get_account(f.account.id).await.unwrap().balance, dec!(10000));
    }

    #[tokio::test]
    async fn test_expense_cannot_charge_foreign_account() {
        let f = fixture(DepositServiceSettings::default()).await;
        let err = f
            .service
            .record_expense(UserId::new(), expense_request(dec!(60), Some(f.account.id)), date(2024, 3, 2))
            .await
            .unwrap_err();

        assert!(matches!(err, DepositError::LinkedAccountNotFound(_)));
        assert_eq!(f.port.get_account(f.account.id).await.unwrap().balance, dec!(10000));
    }

    #[tokio::test]
    async fn test_expense_deleted_without_refund_when_account_gone() {
        let f = fixture(DepositServiceSettings::default()).await;
        let expense = f
            .service
            .record_expense(f.user, expense_request(dec!(60), Some(f.account.id)), date(2024, 3, 2))
            .await
            .unwrap();
        f.service.delete_account(f.user, f.account.id).await.unwrap();

        f.service.delete_expense(f.user, expense.id, date(2024, 3, 3)).await.unwrap();

        let err = f.service.get_expense(f.user, expense.id).await.unwrap_err();
        assert!(matches!(err, DepositError::ExpenseNotFound(_)));
    }

    #[tokio::test]
    async fn test_other_user_cannot_delete_expense() {
        let f = fixture(DepositServiceSettings::default()).await;
        let expense = f
            .service
            .record_expense(f.user, expense_request(dec!(60), Some(f.account.id)), date(2024, 3, 2))
            .await
            .unwrap();

        let err = f.service.delete_expense(UserId::new(), expense.id, date(2024, 3, 3)).await.unwrap_err();

        assert!(matches!(err, DepositError::NotOwned { entity: "Expense", .. }));
        assert_eq!(f.port.get_account(f.account.id).await.unwrap().balance, dec!(9940));
    }

    #[tokio::test]
    async fn test_income_is_listed_newest_first() {
        let f = fixture(DepositServiceSettings::default()).await;
        for (day, amount) in [(1, dec!(85000)), (15, dec!(4000))] {
            let request = RecordIncome {
                source: "Salary".to_string(),
                amount,
                received_on: date(2024, 3, day),
                description: None,
            };
            f.service.record_income(f.user, request, date(2024, 3, day)).await.unwrap();
        }

        let incomes = f.service.list_incomes(f.user).await.unwrap();
        assert_eq!(incomes.len(), 2);
        assert_eq!(incomes[0].amount, dec!(4000));
        assert_eq!(f.port.get_account(f.account.id).await.unwrap().balance, dec!(10000));

        f.service.delete_income(f.user, incomes[0].id).await.unwrap();
        let err = f.service.delete_income(f.user, incomes[0].id).await.unwrap_err();
        assert!(matches!(err, DepositError::IncomeNotFound(_)));
    }
}
