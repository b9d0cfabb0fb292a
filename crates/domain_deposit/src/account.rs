//! Savings accounts
//!
//! Savings accounts are the accounts recurring deposits draw their
//! installments from. Balances are signed and have no floor: an installment
//! that exceeds the balance drives it negative.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{AccountId, MoneyError, UserId};
use crate::error::DepositError;

/// A savings account that can be linked to recurring deposits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsAccount {
    /// Unique identifier
    pub id: AccountId,
    /// Owner
    pub user_id: UserId,
    /// Bank holding the account
    pub bank_name: String,
    /// Account number as printed by the bank
    pub account_number: Option<String>,
    /// Current balance, may be negative
    pub balance: Decimal,
    /// Annual interest rate in percent (informational)
    pub interest_rate: Decimal,
    pub created_at: NaiveDate,
    pub updated_at: NaiveDate,
    /// Optimistic concurrency version
    pub version: i64,
}

impl SavingsAccount {
    /// Creates a new account with an opening balance
    pub fn new(
        user_id: UserId,
        bank_name: impl Into<String>,
        opening_balance: Decimal,
        today: NaiveDate,
    ) -> Self {
        Self {
            id: AccountId::new(),
            user_id,
            bank_name: bank_name.into(),
            account_number: None,
            balance: opening_balance,
            interest_rate: Decimal::ZERO,
            created_at: today,
            updated_at: today,
            version: 0,
        }
    }

    /// Sets the account number
    pub fn with_account_number(mut self, number: impl Into<String>) -> Self {
        self.account_number = Some(number.into());
        self
    }

    /// Sets the interest rate
    pub fn with_interest_rate(mut self, rate: Decimal) -> Self {
        self.interest_rate = rate;
        self
    }

    /// Subtracts `amount` from the balance
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` if the subtraction leaves the decimal range
    pub fn debit(&mut self, amount: Decimal, today: NaiveDate) -> Result<(), MoneyError> {
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or(MoneyError::Overflow)?;
        self.updated_at = today;
        Ok(())
    }

    /// Adds `amount` back to the balance
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` if the addition leaves the decimal range
    pub fn credit(&mut self, amount: Decimal, today: NaiveDate) -> Result<(), MoneyError> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(MoneyError::Overflow)?;
        self.updated_at = today;
        Ok(())
    }

    /// Account number with all but the last four characters masked
    pub fn masked_account_number(&self) -> Option<String> {
        self.account_number.as_ref().map(|number| {
            let chars: Vec<char> = number.chars().collect();
            let visible = chars.len().saturating_sub(4);
            chars
                .iter()
                .enumerate()
                .map(|(i, c)| if i < visible { '*' } else { *c })
                .collect()
        })
    }

    /// Checks the record's own invariants
    pub fn validate(&self) -> Result<(), DepositError> {
        if self.bank_name.trim().is_empty() {
            return Err(DepositError::InvalidAccount("bank name is required".to_string()));
        }
        if self.interest_rate < Decimal::ZERO {
            return Err(DepositError::InvalidAccount("interest rate cannot be negative".to_string()));
        }
        Ok(())
    }

    /// Applies user edits; the balance is set as given
    pub fn apply_changes(&mut self, changes: AccountChanges, today: NaiveDate) {
        self.bank_name = changes.bank_name;
        self.account_number = changes.account_number;
        self.balance = changes.balance;
        self.interest_rate = changes.interest_rate;
        self.updated_at = today;
    }
}

/// Request to open a savings account
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OpenAccount {
    #[validate(length(min = 1, max = 120))]
    pub bank_name: String,
    #[validate(length(min = 4, max = 34))]
    pub account_number: Option<String>,
    pub balance: Decimal,
    #[serde(default)]
    pub interest_rate: Decimal,
}

impl OpenAccount {
    pub fn into_account(self, user_id: UserId, today: NaiveDate) -> SavingsAccount {
        SavingsAccount {
            account_number: self.account_number,
            interest_rate: self.interest_rate,
            ..SavingsAccount::new(user_id, self.bank_name, self.balance, today)
        }
    }
}

/// Full replacement of an account's editable fields
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AccountChanges {
    #[validate(length(min = 1, max = 120))]
    pub bank_name: String,
    #[validate(length(min = 4, max = 34))]
    pub account_number: Option<String>,
    pub balance: Decimal,
    #[serde(default)]
    pub interest_rate: Decimal,
}
