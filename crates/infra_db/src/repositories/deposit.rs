//! Deposit repository implementation
//!
//! This module provides database access for deposits, savings accounts,
//! expenses and income.
//! Every update is conditional on the row's `version` and increments it;
//! multi-row writes run in a single transaction.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::DatabaseError;

/// Repository for deposits, savings accounts and cash flow entries
#[derive(Debug, Clone)]
pub struct DepositRepository {
    pool: PgPool,
}

impl DepositRepository {
    /// Creates a new DepositRepository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Deposits
    // ========================================================================

    pub async fn find_deposit(&self, id: Uuid) -> Result<Option<DepositRow>, DatabaseError> {
        sqlx::query_as::<_, DepositRow>(
            r#"
            SELECT id, user_id, bank_name, kind, amount, interest_rate, start_date,
                   maturity_date, linked_account_id, last_processed_period,
                   created_at, updated_at, version
            FROM deposits
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn list_deposits(&self, user_id: Uuid) -> Result<Vec<DepositRow>, DatabaseError> {
        sqlx::query_as::<_, DepositRow>(
            r#"
            SELECT id, user_id, bank_name, kind, amount, interest_rate, start_date,
                   maturity_date, linked_account_id, last_processed_period,
                   created_at, updated_at, version
            FROM deposits
            WHERE user_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Lists recurring deposits with a linked account, across all users
    pub async fn list_linked_recurring(&self) -> Result<Vec<DepositRow>, DatabaseError> {
        sqlx::query_as::<_, DepositRow>(
            r#"
            SELECT id, user_id, bank_name, kind, amount, interest_rate, start_date,
                   maturity_date, linked_account_id, last_processed_period,
                   created_at, updated_at, version
            FROM deposits
            WHERE kind = 'RD' AND linked_account_id IS NOT NULL
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Inserts a deposit, updating the debited account in the same transaction
    pub async fn insert_deposit(
        &self,
        deposit: &DepositRow,
        debited_account: Option<&AccountRow>,
    ) -> Result<DepositRow, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        if let Some(account) = debited_account {
            update_account_row(&mut tx, account).await?;
        }

        let stored = sqlx::query_as::<_, DepositRow>(
            r#"
            INSERT INTO deposits (
                id, user_id, bank_name, kind, amount, interest_rate, start_date,
                maturity_date, linked_account_id, last_processed_period,
                created_at, updated_at, version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id, user_id, bank_name, kind, amount, interest_rate, start_date,
                      maturity_date, linked_account_id, last_processed_period,
                      created_at, updated_at, version
            "#,
        )
        .bind(deposit.id)
        .bind(deposit.user_id)
        .bind(&deposit.bank_name)
        .bind(&deposit.kind)
        .bind(deposit.amount)
        .bind(deposit.interest_rate)
        .bind(deposit.start_date)
        .bind(deposit.maturity_date)
        .bind(deposit.linked_account_id)
        .bind(deposit.last_processed_period)
        .bind(deposit.created_at)
        .bind(deposit.updated_at)
        .bind(deposit.version)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(stored)
    }

    pub async fn update_deposit(&self, deposit: &DepositRow) -> Result<DepositRow, DatabaseError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from_sqlx)?;
        update_deposit_row(&mut conn, deposit).await
    }

    /// Deletes a deposit, returning false if it did not exist
    pub async fn delete_deposit(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM deposits WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Savings accounts
    // ========================================================================

    pub async fn find_account(&self, id: Uuid) -> Result<Option<AccountRow>, DatabaseError> {
        sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, user_id, bank_name, account_number, balance, interest_rate,
                   created_at, updated_at, version
            FROM savings_accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn list_accounts(&self, user_id: Uuid) -> Result<Vec<AccountRow>, DatabaseError> {
        sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, user_id, bank_name, account_number, balance, interest_rate,
                   created_at, updated_at, version
            FROM savings_accounts
            WHERE user_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn insert_account(&self, account: &AccountRow) -> Result<AccountRow, DatabaseError> {
        sqlx::query_as::<_, AccountRow>(
            r#"
            INSERT INTO savings_accounts (
                id, user_id, bank_name, account_number, balance, interest_rate,
                created_at, updated_at, version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, user_id, bank_name, account_number, balance, interest_rate,
                      created_at, updated_at, version
            "#,
        )
        .bind(account.id)
        .bind(account.user_id)
        .bind(&account.bank_name)
        .bind(&account.account_number)
        .bind(account.balance)
        .bind(account.interest_rate)
        .bind(account.created_at)
        .bind(account.updated_at)
        .bind(account.version)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn update_account(&self, account: &AccountRow) -> Result<AccountRow, DatabaseError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from_sqlx)?;
        update_account_row(&mut conn, account).await
    }

    /// Deletes an account, returning false if it did not exist
    pub async fn delete_account(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM savings_accounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Expenses and income
    // ========================================================================

    pub async fn find_expense(&self, id: Uuid) -> Result<Option<ExpenseRow>, DatabaseError> {
        sqlx::query_as::<_, ExpenseRow>(
            r#"
            SELECT id, user_id, category, amount, spent_on, description, account_id,
                   created_at, updated_at
            FROM expenses
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn list_expenses(&self, user_id: Uuid) -> Result<Vec<ExpenseRow>, DatabaseError> {
        sqlx::query_as::<_, ExpenseRow>(
            r#"
            SELECT id, user_id, category, amount, spent_on, description, account_id,
                   created_at, updated_at
            FROM expenses
            WHERE user_id = $1
            ORDER BY spent_on DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Inserts an expense, updating the debited account in the same transaction
    pub async fn insert_expense(
        &self,
        expense: &ExpenseRow,
        debited_account: Option<&AccountRow>,
    ) -> Result<ExpenseRow, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        if let Some(account) = debited_account {
            update_account_row(&mut tx, account).await?;
        }

        let stored = sqlx::query_as::<_, ExpenseRow>(
            r#"
            INSERT INTO expenses (
                id, user_id, category, amount, spent_on, description, account_id,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, user_id, category, amount, spent_on, description, account_id,
                      created_at, updated_at
            "#,
        )
        .bind(expense.id)
        .bind(expense.user_id)
        .bind(&expense.category)
        .bind(expense.amount)
        .bind(expense.spent_on)
        .bind(&expense.description)
        .bind(expense.account_id)
        .bind(expense.created_at)
        .bind(expense.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(stored)
    }

    /// Deletes an expense, updating the refunded account in the same
    /// transaction; returns false if the expense did not exist
    pub async fn delete_expense(
        &self,
        id: Uuid,
        refunded_account: Option<&AccountRow>,
    ) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let result = sqlx::query("DELETE FROM expenses WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }
        if let Some(account) = refunded_account {
            update_account_row(&mut tx, account).await?;
        }

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(true)
    }

    pub async fn find_income(&self, id: Uuid) -> Result<Option<IncomeRow>, DatabaseError> {
        sqlx::query_as::<_, IncomeRow>(
            r#"
            SELECT id, user_id, source, amount, received_on, description, created_at
            FROM incomes
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn list_incomes(&self, user_id: Uuid) -> Result<Vec<IncomeRow>, DatabaseError> {
        sqlx::query_as::<_, IncomeRow>(
            r#"
            SELECT id, user_id, source, amount, received_on, description, created_at
            FROM incomes
            WHERE user_id = $1
            ORDER BY received_on DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn insert_income(&self, income: &IncomeRow) -> Result<IncomeRow, DatabaseError> {
        sqlx::query_as::<_, IncomeRow>(
            r#"
            INSERT INTO incomes (id, user_id, source, amount, received_on, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, source, amount, received_on, description, created_at
            "#,
        )
        .bind(income.id)
        .bind(income.user_id)
        .bind(&income.source)
        .bind(income.amount)
        .bind(income.received_on)
        .bind(&income.description)
        .bind(income.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Deletes an income entry, returning false if it did not exist
    pub async fn delete_income(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM incomes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Deductions
    // ========================================================================

    /// Writes a reconciled deposit and its debited account in one transaction
    ///
    /// A stale version on either row rolls back both updates.
    pub async fn commit_deduction(
        &self,
        deposit: &DepositRow,
        account: &AccountRow,
    ) -> Result<(DepositRow, AccountRow), DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let stored_deposit = update_deposit_row(&mut tx, deposit).await?;
        let stored_account = update_account_row(&mut tx, account).await?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok((stored_deposit, stored_account))
    }
}

async fn update_deposit_row(
    conn: &mut PgConnection,
    deposit: &DepositRow,
) -> Result<DepositRow, DatabaseError> {
    let updated = sqlx::query_as::<_, DepositRow>(
        r#"
        UPDATE deposits
        SET bank_name = $3,
            kind = $4,
            amount = $5,
            interest_rate = $6,
            start_date = $7,
            maturity_date = $8,
            linked_account_id = $9,
            last_processed_period = $10,
            updated_at = $11,
            version = version + 1
        WHERE id = $1 AND version = $2
        RETURNING id, user_id, bank_name, kind, amount, interest_rate, start_date,
                  maturity_date, linked_account_id, last_processed_period,
                  created_at, updated_at, version
        "#,
    )
    .bind(deposit.id)
    .bind(deposit.version)
    .bind(&deposit.bank_name)
    .bind(&deposit.kind)
    .bind(deposit.amount)
    .bind(deposit.interest_rate)
    .bind(deposit.start_date)
    .bind(deposit.maturity_date)
    .bind(deposit.linked_account_id)
    .bind(deposit.last_processed_period)
    .bind(deposit.updated_at)
    .fetch_optional(&mut *conn)
    .await
    .map_err(DatabaseError::from_sqlx)?;

    match updated {
        Some(row) => Ok(row),
        None => Err(missing_or_stale(conn, "deposits", "Deposit", deposit.id, deposit.version).await),
    }
}

async fn update_account_row(
    conn: &mut PgConnection,
    account: &AccountRow,
) -> Result<AccountRow, DatabaseError> {
    let updated = sqlx::query_as::<_, AccountRow>(
        r#"
        UPDATE savings_accounts
        SET bank_name = $3,
            account_number = $4,
            balance = $5,
            interest_rate = $6,
            updated_at = $7,
            version = version + 1
        WHERE id = $1 AND version = $2
        RETURNING id, user_id, bank_name, account_number, balance, interest_rate,
                  created_at, updated_at, version
        "#,
    )
    .bind(account.id)
    .bind(account.version)
    .bind(&account.bank_name)
    .bind(&account.account_number)
    .bind(account.balance)
    .bind(account.interest_rate)
    .bind(account.updated_at)
    .fetch_optional(&mut *conn)
    .await
    .map_err(DatabaseError::from_sqlx)?;

    match updated {
        Some(row) => Ok(row),
        None => Err(missing_or_stale(conn, "savings_accounts", "SavingsAccount", account.id, account.version).await),
    }
}

/// Explains why a versioned update matched no row
pub(crate) async fn missing_or_stale(
    conn: &mut PgConnection,
    table: &'static str,
    entity: &'static str,
    id: Uuid,
    expected_version: i64,
) -> DatabaseError {
    let sql = format!("SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)", table);
    match sqlx::query_scalar::<_, bool>(&sql).bind(id).fetch_one(&mut *conn).await {
        Ok(true) => DatabaseError::stale(entity, id, expected_version),
        Ok(false) => DatabaseError::not_found(entity, id),
        Err(e) => DatabaseError::from_sqlx(e),
    }
}

/// Database row for a deposit
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DepositRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bank_name: String,
    /// `FD` or `RD`
    pub kind: String,
    pub amount: Decimal,
    pub interest_rate: Decimal,
    pub start_date: Option<NaiveDate>,
    pub maturity_date: NaiveDate,
    pub linked_account_id: Option<Uuid>,
    pub last_processed_period: Option<NaiveDate>,
    pub created_at: NaiveDate,
    pub updated_at: NaiveDate,
    pub version: i64,
}

/// Database row for a savings account
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bank_name: String,
    pub account_number: Option<String>,
    pub balance: Decimal,
    pub interest_rate: Decimal,
    pub created_at: NaiveDate,
    pub updated_at: NaiveDate,
    pub version: i64,
}

/// Database row for an expense
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ExpenseRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category: String,
    pub amount: Decimal,
    pub spent_on: NaiveDate,
    pub description: Option<String>,
    pub account_id: Option<Uuid>,
    pub created_at: NaiveDate,
    pub updated_at: NaiveDate,
}

/// Database row for an income entry
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct IncomeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub source: String,
    pub amount: Decimal,
    pub received_on: NaiveDate,
    pub description: Option<String>,
    pub created_at: NaiveDate,
}
