//! PostgreSQL Deposit Adapter
//!
//! Implements `DepositPort` on top of the `DepositRepository`, converting
//! rows to domain types and database errors to port errors.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresDepositAdapter;
//! use domain_deposit::{DepositPort, DepositService};
//! use std::sync::Arc;
//!
//! let port: Arc<dyn DepositPort> = Arc::new(PostgresDepositAdapter::new(pool));
//! let service = DepositService::new(port);
//! ```

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{AccountId, DepositId, DomainPort, ExpenseId, IncomeId, PortError, UserId};
use domain_deposit::{Deposit, DepositKind, DepositPort, Expense, Income, SavingsAccount};

use crate::error::DatabaseError;
use crate::repositories::deposit::{AccountRow, DepositRepository, DepositRow, ExpenseRow, IncomeRow};

/// PostgreSQL-backed implementation of the DepositPort trait
///
/// Database errors are translated to `PortError` variants:
/// - `DatabaseError::NotFound` -> `PortError::NotFound`
/// - `DatabaseError::StaleVersion` -> `PortError::Conflict`
/// - Other errors -> see `From<DatabaseError> for PortError`
#[derive(Debug, Clone)]
pub struct PostgresDepositAdapter {
    repository: DepositRepository,
}

impl PostgresDepositAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: DepositRepository::new(pool),
        }
    }

    /// Returns a reference to the underlying repository
    pub fn repository(&self) -> &DepositRepository {
        &self.repository
    }
}

impl DomainPort for PostgresDepositAdapter {}

#[async_trait]
impl DepositPort for PostgresDepositAdapter {
    #[instrument(skip(self), fields(deposit_id = %id))]
    async fn get_deposit(&self, id: DepositId) -> Result<Deposit, PortError> {
        let row = self
            .repository
            .find_deposit(id.into())
            .await?
            .ok_or_else(|| PortError::not_found("Deposit", id))?;
        Ok(row_to_deposit(row)?)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn list_deposits(&self, user_id: UserId) -> Result<Vec<Deposit>, PortError> {
        let rows = self.repository.list_deposits(user_id.into()).await?;
        debug!(count = rows.len(), "Loaded deposits");
        rows.into_iter()
            .map(|row| row_to_deposit(row).map_err(PortError::from))
            .collect()
    }

    #[instrument(skip(self))]
    async fn list_linked_recurring(&self) -> Result<Vec<Deposit>, PortError> {
        let rows = self.repository.list_linked_recurring().await?;
        debug!(count = rows.len(), "Loaded scheduled deposits");
        rows.into_iter()
            .map(|row| row_to_deposit(row).map_err(PortError::from))
            .collect()
    }

    #[instrument(skip(self, deposit, debited_account), fields(deposit_id = %deposit.id))]
    async fn insert_deposit(
        &self,
        deposit: &Deposit,
        debited_account: Option<&SavingsAccount>,
    ) -> Result<Deposit, PortError> {
        let account_row = debited_account.map(account_to_row);
        let stored = self
            .repository
            .insert_deposit(&deposit_to_row(deposit), account_row.as_ref())
            .await?;
        debug!(debited = account_row.is_some(), "Deposit inserted");
        Ok(row_to_deposit(stored)?)
    }

    #[instrument(skip(self, deposit), fields(deposit_id = %deposit.id, version = deposit.version))]
    async fn update_deposit(&self, deposit: &Deposit) -> Result<Deposit, PortError> {
        let stored = self.repository.update_deposit(&deposit_to_row(deposit)).await?;
        Ok(row_to_deposit(stored)?)
    }

    #[instrument(skip(self), fields(deposit_id = %id))]
    async fn delete_deposit(&self, id: DepositId) -> Result<(), PortError> {
        if self.repository.delete_deposit(id.into()).await? {
            Ok(())
        } else {
            Err(PortError::not_found("Deposit", id))
        }
    }

    #[instrument(skip(self), fields(account_id = %id))]
    async fn get_account(&self, id: AccountId) -> Result<SavingsAccount, PortError> {
        self.repository
            .find_account(id.into())
            .await?
            .map(row_to_account)
            .ok_or_else(|| PortError::not_found("SavingsAccount", id))
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn list_accounts(&self, user_id: UserId) -> Result<Vec<SavingsAccount>, PortError> {
        let rows = self.repository.list_accounts(user_id.into()).await?;
        Ok(rows.into_iter().map(row_to_account).collect())
    }

    #[instrument(skip(self, account), fields(account_id = %account.id))]
    async fn insert_account(&self, account: &SavingsAccount) -> Result<SavingsAccount, PortError> {
        let stored = self.repository.insert_account(&account_to_row(account)).await?;
        Ok(row_to_account(stored))
    }

    #[instrument(skip(self, account), fields(account_id = %account.id, version = account.version))]
    async fn update_account(&self, account: &SavingsAccount) -> Result<SavingsAccount, PortError> {
        let stored = self.repository.update_account(&account_to_row(account)).await?;
        Ok(row_to_account(stored))
    }

    #[instrument(skip(self), fields(account_id = %id))]
    async fn delete_account(&self, id: AccountId) -> Result<(), PortError> {
        if self.repository.delete_account(id.into()).await? {
            Ok(())
        } else {
            Err(PortError::not_found("SavingsAccount", id))
        }
    }

    #[instrument(skip(self), fields(expense_id = %id))]
    async fn get_expense(&self, id: ExpenseId) -> Result<Expense, PortError> {
        self.repository
            .find_expense(id.into())
            .await?
            .map(row_to_expense)
            .ok_or_else(|| PortError::not_found("Expense", id))
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn list_expenses(&self, user_id: UserId) -> Result<Vec<Expense>, PortError> {
        let rows = self.repository.list_expenses(user_id.into()).await?;
        Ok(rows.into_iter().map(row_to_expense).collect())
    }

    #[instrument(skip(self, expense, debited_account), fields(expense_id = %expense.id))]
    async fn insert_expense(
        &self,
        expense: &Expense,
        debited_account: Option<&SavingsAccount>,
    ) -> Result<Expense, PortError> {
        let account_row = debited_account.map(account_to_row);
        let stored = self
            .repository
            .insert_expense(&expense_to_row(expense), account_row.as_ref())
            .await?;
        debug!(debited = account_row.is_some(), "Expense inserted");
        Ok(row_to_expense(stored))
    }

    #[instrument(skip(self, refunded_account), fields(expense_id = %id))]
    async fn delete_expense(
        &self,
        id: ExpenseId,
        refunded_account: Option<&SavingsAccount>,
    ) -> Result<(), PortError> {
        let account_row = refunded_account.map(account_to_row);
        if self.repository.delete_expense(id.into(), account_row.as_ref()).await? {
            Ok(())
        } else {
            Err(PortError::not_found("Expense", id))
        }
    }

    #[instrument(skip(self), fields(income_id = %id))]
    async fn get_income(&self, id: IncomeId) -> Result<Income, PortError> {
        self.repository
            .find_income(id.into())
            .await?
            .map(row_to_income)
            .ok_or_else(|| PortError::not_found("Income", id))
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn list_incomes(&self, user_id: UserId) -> Result<Vec<Income>, PortError> {
        let rows = self.repository.list_incomes(user_id.into()).await?;
        Ok(rows.into_iter().map(row_to_income).collect())
    }

    #[instrument(skip(self, income), fields(income_id = %income.id))]
    async fn insert_income(&self, income: &Income) -> Result<Income, PortError> {
        let stored = self.repository.insert_income(&income_to_row(income)).await?;
        Ok(row_to_income(stored))
    }

    #[instrument(skip(self), fields(income_id = %id))]
    async fn delete_income(&self, id: IncomeId) -> Result<(), PortError> {
        if self.repository.delete_income(id.into()).await? {
            Ok(())
        } else {
            Err(PortError::not_found("Income", id))
        }
    }

    #[instrument(
        skip(self, deposit, account),
        fields(deposit_id = %deposit.id, account_id = %account.id)
    )]
    async fn commit_deduction(
        &self,
        deposit: &Deposit,
        account: &SavingsAccount,
    ) -> Result<(Deposit, SavingsAccount), PortError> {
        let (deposit_row, account_row) = self
            .repository
            .commit_deduction(&deposit_to_row(deposit), &account_to_row(account))
            .await?;
        debug!(
            last_processed_period = ?deposit_row.last_processed_period,
            balance = %account_row.balance,
            "Deduction committed"
        );
        Ok((row_to_deposit(deposit_row)?, row_to_account(account_row)))
    }
}

// ============================================================================
// Row conversions
// ============================================================================

fn row_to_deposit(row: DepositRow) -> Result<Deposit, DatabaseError> {
    let kind = DepositKind::from_code(&row.kind).ok_or_else(|| {
        DatabaseError::CorruptRow(format!("deposit {} has unknown kind '{}'", row.id, row.kind))
    })?;

    Ok(Deposit {
        id: row.id.into(),
        user_id: row.user_id.into(),
        bank_name: row.bank_name,
        kind,
        amount: row.amount,
        interest_rate: row.interest_rate,
        start_date: row.start_date,
        maturity_date: row.maturity_date,
        linked_account_id: row.linked_account_id.map(AccountId::from),
        last_processed_period: row.last_processed_period,
        created_at: row.created_at,
        updated_at: row.updated_at,
        version: row.version,
    })
}

fn deposit_to_row(deposit: &Deposit) -> DepositRow {
    DepositRow {
        id: deposit.id.into(),
        user_id: deposit.user_id.into(),
        bank_name: deposit.bank_name.clone(),
        kind: deposit.kind.code().to_string(),
        amount: deposit.amount,
        interest_rate: deposit.interest_rate,
        start_date: deposit.start_date,
        maturity_date: deposit.maturity_date,
        linked_account_id: deposit.linked_account_id.map(Into::into),
        last_processed_period: deposit.last_processed_period,
        created_at: deposit.created_at,
        updated_at: deposit.updated_at,
        version: deposit.version,
    }
}

fn row_to_account(row: AccountRow) -> SavingsAccount {
    SavingsAccount {
        id: row.id.into(),
        user_id: row.user_id.into(),
        bank_name: row.bank_name,
        account_number: row.account_number,
        balance: row.balance,
        interest_rate: row.interest_rate,
        created_at: row.created_at,
        updated_at: row.updated_at,
        version: row.version,
    }
}

fn account_to_row(account: &SavingsAccount) -> AccountRow {
    AccountRow {
        id: account.id.into(),
        user_id: account.user_id.into(),
        bank_name: account.bank_name.clone(),
        account_number: account.account_number.clone(),
        balance: account.balance,
        interest_rate: account.interest_rate,
        created_at: account.created_at,
        updated_at: account.updated_at,
        version: account.version,
    }
}

fn row_to_expense(row: ExpenseRow) -> Expense {
    Expense {
        id: row.id.into(),
        user_id: row.user_id.into(),
        category: row.category,
        amount: row.amount,
        spent_on: row.spent_on,
        description: row.description,
        account_id: row.account_id.map(AccountId::from),
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn expense_to_row(expense: &Expense) -> ExpenseRow {
    ExpenseRow {
        id: expense.id.into(),
        user_id: expense.user_id.into(),
        category: expense.category.clone(),
        amount: expense.amount,
        spent_on: expense.spent_on,
        description: expense.description.clone(),
        account_id: expense.account_id.map(Into::into),
        created_at: expense.created_at,
        updated_at: expense.updated_at,
    }
}

fn row_to_income(row: IncomeRow) -> Income {
    Income {
        id: row.id.into(),
        user_id: row.user_id.into(),
        source: row.source,
        amount: row.amount,
        received_on: row.received_on,
        description: row.description,
        created_at: row.created_at,
    }
}

fn income_to_row(income: &Income) -> IncomeRow {
    IncomeRow {
        id: income.id.into(),
        user_id: income.user_id.into(),
        source: income.source.clone(),
        amount: income.amount,
        received_on: income.received_on,
        description: income.description.clone(),
        created_at: income.created_at,
    }
}
