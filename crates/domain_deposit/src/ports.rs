//! Deposit Domain Ports
//!
//! The `DepositPort` trait is everything the deposit services need from a
//! store. Two adapters implement it:
//!
//! - **PostgreSQL Adapter**: `infra_db::PostgresDepositAdapter`
//! - **Mock Adapter**: in-memory, for tests (`mock` feature)
//!
//! # Versioning
//!
//! Updates are conditional on the `version` the caller loaded. A successful
//! update stores `version + 1` and returns the stored record; a stale version
//! fails with `PortError::Conflict` and writes nothing. Inserts store the
//! record as given.
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_deposit::{DepositPort, DepositService};
//! use std::sync::Arc;
//!
//! let port: Arc<dyn DepositPort> = Arc::new(PostgresDepositAdapter::new(pool));
//! let service = DepositService::new(port);
//! ```

use async_trait::async_trait;

use core_kernel::{AccountId, DepositId, DomainPort, ExpenseId, IncomeId, PortError, UserId};

use crate::account::SavingsAccount;
use crate::cashflow::{Expense, Income};
use crate::deposit::Deposit;

/// Store operations for deposits, savings accounts and cash flow entries
#[async_trait]
pub trait DepositPort: DomainPort {
    // ========================================================================
    // Deposits
    // ========================================================================

    /// Retrieves a deposit by ID, or `PortError::NotFound`
    async fn get_deposit(&self, id: DepositId) -> Result<Deposit, PortError>;

    /// Lists a user's deposits, oldest first
    async fn list_deposits(&self, user_id: UserId) -> Result<Vec<Deposit>, PortError>;

    /// Lists every recurring deposit that has a linked account, across users
    async fn list_linked_recurring(&self) -> Result<Vec<Deposit>, PortError>;

    /// Inserts a new deposit
    ///
    /// When `debited_account` is given it is updated in the same atomic write
    /// under the usual version check. Neither record is written on failure.
    async fn insert_deposit(
        &self,
        deposit: &Deposit,
        debited_account: Option<&SavingsAccount>,
    ) -> Result<Deposit, PortError>;

    /// Updates a deposit if its version is current
    async fn update_deposit(&self, deposit: &Deposit) -> Result<Deposit, PortError>;

    /// Deletes a deposit
    async fn delete_deposit(&self, id: DepositId) -> Result<(), PortError>;

    // ========================================================================
    // Savings accounts
    // ========================================================================

    /// Retrieves an account by ID, or `PortError::NotFound`
    async fn get_account(&self, id: AccountId) -> Result<SavingsAccount, PortError>;

    /// Lists a user's accounts, oldest first
    async fn list_accounts(&self, user_id: UserId) -> Result<Vec<SavingsAccount>, PortError>;

    /// Inserts a new account
    async fn insert_account(&self, account: &SavingsAccount) -> Result<SavingsAccount, PortError>;

    /// Updates an account if its version is current
    async fn update_account(&self, account: &SavingsAccount) -> Result<SavingsAccount, PortError>;

    /// Deletes an account; deposits linked to it keep their dangling link
    async fn delete_account(&self, id: AccountId) -> Result<(), PortError>;

    // ========================================================================
    // Expenses and income
    // ========================================================================

    /// Retrieves an expense by ID, or `PortError::NotFound`
    async fn get_expense(&self, id: ExpenseId) -> Result<Expense, PortError>;

    /// Lists a user's expenses, most recently spent first
    async fn list_expenses(&self, user_id: UserId) -> Result<Vec<Expense>, PortError>;

    /// Inserts an expense
    ///
    /// When `debited_account` is given it is updated in the same atomic write
    /// under the usual version check.
    async fn insert_expense(
        &self,
        expense: &Expense,
        debited_account: Option<&SavingsAccount>,
    ) -> Result<Expense, PortError>;

    /// Deletes an expense
    ///
    /// When `refunded_account` is given it is updated in the same atomic
    /// write; a stale account version keeps the expense in place.
    async fn delete_expense(
        &self,
        id: ExpenseId,
        refunded_account: Option<&SavingsAccount>,
    ) -> Result<(), PortError>;

    async fn get_income(&self, id: IncomeId) -> Result<Income, PortError>;

    /// Lists a user's income entries, most recently received first
    async fn list_incomes(&self, user_id: UserId) -> Result<Vec<Income>, PortError>;

    async fn insert_income(&self, income: &Income) -> Result<Income, PortError>;

    async fn delete_income(&self, id: IncomeId) -> Result<(), PortError>;

    // ========================================================================
    // Deductions
    // ========================================================================

    /// Stores a reconciled deposit and its debited account together
    ///
    /// Both versions are checked before either record is written; the pair is
    /// stored atomically or not at all.
    async fn commit_deduction(
        &self,
        deposit: &Deposit,
        account: &SavingsAccount,
    ) -> Result<(Deposit, SavingsAccount), PortError>;
}

/// Mock implementation of DepositPort for testing
///
/// Keeps records in memory behind a single lock so multi-record writes are
/// atomic. Commit failures can be injected to exercise retry and rollback
/// paths.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::sync::RwLock;

    #[derive(Debug, Default)]
    struct Store {
        deposits: HashMap<DepositId, Deposit>,
        accounts: HashMap<AccountId, SavingsAccount>,
        expenses: HashMap<ExpenseId, Expense>,
        incomes: HashMap<IncomeId, Income>,
    }

    impl Store {
        fn check_account(&self, account: &SavingsAccount) -> Result<(), PortError> {
            let stored = self
                .accounts
                .get(&account.id)
                .ok_or_else(|| PortError::not_found("SavingsAccount", account.id))?;
            if stored.version != account.version {
                return Err(PortError::stale("SavingsAccount", account.id, account.version));
            }
            Ok(())
        }

        fn check_deposit(&self, deposit: &Deposit) -> Result<(), PortError> {
            let stored = self
                .deposits
                .get(&deposit.id)
                .ok_or_else(|| PortError::not_found("Deposit", deposit.id))?;
            if stored.version != deposit.version {
                return Err(PortError::stale("Deposit", deposit.id, deposit.version));
            }
            Ok(())
        }

        fn put_account(&mut self, account: &SavingsAccount) -> SavingsAccount {
            let mut stored = account.clone();
            stored.version += 1;
            self.accounts.insert(stored.id, stored.clone());
            stored
        }

        fn put_deposit(&mut self, deposit: &Deposit) -> Deposit {
            let mut stored = deposit.clone();
            stored.version += 1;
            self.deposits.insert(stored.id, stored.clone());
            stored
        }
    }

    /// In-memory mock implementation of DepositPort
    #[derive(Debug, Default)]
    pub struct MockDepositPort {
        store: Arc<RwLock<Store>>,
        commit_conflicts: AtomicU32,
        commit_failures: AtomicU32,
    }

    impl MockDepositPort {
        /// Creates an empty mock port
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates with accounts and deposits for testing
        pub async fn with_records(accounts: Vec<SavingsAccount>, deposits: Vec<Deposit>) -> Self {
            let port = Self::new();
            {
                let mut store = port.store.write().await;
                for account in accounts {
                    store.accounts.insert(account.id, account);
                }
                for deposit in deposits {
                    store.deposits.insert(deposit.id, deposit);
                }
            }
            port
        }

        /// Makes the next `count` calls to `commit_deduction` fail with a conflict
        pub fn inject_commit_conflicts(&self, count: u32) {
            self.commit_conflicts.store(count, Ordering::SeqCst);
        }

        /// Makes the next `count` calls to `commit_deduction` fail with a
        /// connection error
        pub fn inject_commit_failures(&self, count: u32) {
            self.commit_failures.store(count, Ordering::SeqCst);
        }

        fn take_injected(counter: &AtomicU32) -> bool {
            counter
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    impl DomainPort for MockDepositPort {}

    #[async_trait]
    impl DepositPort for MockDepositPort {
        async fn get_deposit(&self, id: DepositId) -> Result<Deposit, PortError> {
            self.store
                .read()
                .await
                .deposits
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Deposit", id))
        }

        async fn list_deposits(&self, user_id: UserId) -> Result<Vec<Deposit>, PortError> {
            let store = self.store.read().await;
            let mut deposits: Vec<_> = store
                .deposits
                .values()
                .filter(|d| d.user_id == user_id)
                .cloned()
                .collect();
            deposits.sort_by_key(|d| (d.created_at, d.id));
            Ok(deposits)
        }

        async fn list_linked_recurring(&self) -> Result<Vec<Deposit>, PortError> {
            let store = self.store.read().await;
            let mut deposits: Vec<_> = store
                .deposits
                .values()
                .filter(|d| d.is_scheduled())
                .cloned()
                .collect();
            deposits.sort_by_key(|d| (d.created_at, d.id));
            Ok(deposits)
        }

        async fn insert_deposit(
            &self,
            deposit: &Deposit,
            debited_account: Option<&SavingsAccount>,
        ) -> Result<Deposit, PortError> {
            let mut store = self.store.write().await;
            if store.deposits.contains_key(&deposit.id) {
                return Err(PortError::conflict(format!("Deposit {} already exists", deposit.id)));
            }
            if let Some(account) = debited_account {
                store.check_account(account)?;
                store.put_account(account);
            }
            store.deposits.insert(deposit.id, deposit.clone());
            Ok(deposit.clone())
        }

        async fn update_deposit(&self, deposit: &Deposit) -> Result<Deposit, PortError> {
            let mut store = self.store.write().await;
            store.check_deposit(deposit)?;
            Ok(store.put_deposit(deposit))
        }

        async fn delete_deposit(&self, id: DepositId) -> Result<(), PortError> {
            self.store
                .write()
                .await
                .deposits
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| PortError::not_found("Deposit", id))
        }

        async fn get_account(&self, id: AccountId) -> Result<SavingsAccount, PortError> {
            self.store
                .read()
                .await
                .accounts
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("SavingsAccount", id))
        }

        async fn list_accounts(&self, user_id: UserId) -> Result<Vec<SavingsAccount>, PortError> {
            let store = self.store.read().await;
            let mut accounts: Vec<_> = store
                .accounts
                .values()
                .filter(|a| a.user_id == user_id)
                .cloned()
                .collect();
            accounts.sort_by_key(|a| (a.created_at, a.id));
            Ok(accounts)
        }

        async fn insert_account(&self, account: &SavingsAccount) -> Result<SavingsAccount, PortError> {
            let mut store = self.store.write().await;
            if store.accounts.contains_key(&account.id) {
                return Err(PortError::conflict(format!("SavingsAccount {} already exists", account.id)));
            }
            store.accounts.insert(account.id, account.clone());
            Ok(account.clone())
        }

        async fn update_account(&self, account: &SavingsAccount) -> Result<SavingsAccount, PortError> {
            let mut store = self.store.write().await;
            store.check_account(account)?;
            Ok(store.put_account(account))
        }

        async fn delete_account(&self, id: AccountId) -> Result<(), PortError> {
            self.store
                .write()
                .await
                .accounts
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| PortError::not_found("SavingsAccount", id))
        }

        async fn get_expense(&self, id: ExpenseId) -> Result<Expense, PortError> {
            self.store
                .read()
                .await
                .expenses
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Expense", id))
        }

        async fn list_expenses(&self, user_id: UserId) -> Result<Vec<Expense>, PortError> {
            let store = self.store.read().await;
            let mut expenses: Vec<_> = store
                .expenses
                .values()
                .filter(|e| e.user_id == user_id)
                .cloned()
                .collect();
            expenses.sort_by(|a, b| b.spent_on.cmp(&a.spent_on).then(b.id.cmp(&a.id)));
            Ok(expenses)
        }

        async fn insert_expense(
            &self,
            expense: &Expense,
            debited_account: Option<&SavingsAccount>,
        ) -> Result<Expense, PortError> {
            let mut store = self.store.write().await;
            if store.expenses.contains_key(&expense.id) {
                return Err(PortError::conflict(format!("Expense {} already exists", expense.id)));
            }
            if let Some(account) = debited_account {
                store.check_account(account)?;
                store.put_account(account);
            }
            store.expenses.insert(expense.id, expense.clone());
            Ok(expense.clone())
        }

        async fn delete_expense(
            &self,
            id: ExpenseId,
            refunded_account: Option<&SavingsAccount>,
        ) -> Result<(), PortError> {
            let mut store = self.store.write().await;
            if !store.expenses.contains_key(&id) {
                return Err(PortError::not_found("Expense", id));
            }
            if let Some(account) = refunded_account {
                store.check_account(account)?;
                store.put_account(account);
            }
            store.expenses.remove(&id);
            Ok(())
        }

        async fn get_income(&self, id: IncomeId) -> Result<Income, PortError> {
            self.store
                .read()
                .await
                .incomes
                .get(&id)
                .cloned()
                .ok_or_else(|| PortError::not_found("Income", id))
        }

        async fn list_incomes(&self, user_id: UserId) -> Result<Vec<Income>, PortError> {
            let store = self.store.read().await;
            let mut incomes: Vec<_> = store
                .incomes
                .values()
                .filter(|i| i.user_id == user_id)
                .cloned()
                .collect();
            incomes.sort_by(|a, b| b.received_on.cmp(&a.received_on).then(b.id.cmp(&a.id)));
            Ok(incomes)
        }

        async fn insert_income(&self, income: &Income) -> Result<Income, PortError> {
            let mut store = self.store.write().await;
            if store.incomes.contains_key(&income.id) {
                return Err(PortError::conflict(format!("Income {} already exists", income.id)));
            }
            store.incomes.insert(income.id, income.clone());
            Ok(income.clone())
        }

        async fn delete_income(&self, id: IncomeId) -> Result<(), PortError> {
            self.store
                .write()
                .await
                .incomes
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| PortError::not_found("Income", id))
        }

        async fn commit_deduction(
            &self,
            deposit: &Deposit,
            account: &SavingsAccount,
        ) -> Result<(Deposit, SavingsAccount), PortError> {
            if Self::take_injected(&self.commit_failures) {
                return Err(PortError::connection("injected commit failure"));
            }
            if Self::take_injected(&self.commit_conflicts) {
                return Err(PortError::stale("Deposit", deposit.id, deposit.version));
            }

            let mut store = self.store.write().await;
            store.check_deposit(deposit)?;
            store.check_account(account)?;
            let deposit = store.put_deposit(deposit);
            let account = store.put_account(account);
            Ok((deposit, account))
        }
    }
}
