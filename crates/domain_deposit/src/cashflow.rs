//! Expenses and income
//!
//! An expense may name one of the user's savings accounts. Recording it
//! debits that account and deleting it credits the amount back, in the same
//! atomic write as the expense row. Income entries are plain records and
//! never touch a balance.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::{AccountId, ExpenseId, IncomeId, UserId};
use crate::deposit::positive_amount;
use crate::error::DepositError;

/// Money spent, optionally paid from a savings account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub user_id: UserId,
    /// Free-form bucket such as "Groceries" or "Rent"
    pub category: String,
    pub amount: Decimal,
    /// Day the money was spent
    pub spent_on: NaiveDate,
    pub description: Option<String>,
    /// Account the amount was debited from
    pub account_id: Option<AccountId>,
    pub created_at: NaiveDate,
    pub updated_at: NaiveDate,
}

impl Expense {
    pub fn new(
        user_id: UserId,
        category: impl Into<String>,
        amount: Decimal,
        spent_on: NaiveDate,
        today: NaiveDate,
    ) -> Self {
        Self {
            id: ExpenseId::new(),
            user_id,
            category: category.into(),
            amount,
            spent_on,
            description: None,
            account_id: None,
            created_at: today,
            updated_at: today,
        }
    }

    /// Pays the expense from a savings account
    pub fn paid_from(mut self, account_id: AccountId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    /// Checks the record's own invariants
    pub fn validate(&self) -> Result<(), DepositError> {
        if self.category.trim().is_empty() {
            return Err(DepositError::InvalidExpense("category is required".to_string()));
        }
        if self.amount <= Decimal::ZERO {
            return Err(DepositError::InvalidExpense(format!(
                "amount {} must be positive",
                self.amount
            )));
        }
        Ok(())
    }
}

/// Request to record an expense
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecordExpense {
    #[validate(length(min = 1, max = 60))]
    pub category: String,
    #[validate(custom(function = "positive_amount"))]
    pub amount: Decimal,
    pub spent_on: NaiveDate,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub account_id: Option<AccountId>,
}

impl RecordExpense {
    pub fn into_expense(self, user_id: UserId, today: NaiveDate) -> Expense {
        Expense {
            description: self.description,
            account_id: self.account_id,
            ..Expense::new(user_id, self.category, self.amount, self.spent_on, today)
        }
    }
}

/// Money received
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Income {
    pub id: IncomeId,
    pub user_id: UserId,
    /// Where the money came from, e.g. "Salary"
    pub source: String,
    pub amount: Decimal,
    pub received_on: NaiveDate,
    pub description: Option<String>,
    pub created_at: NaiveDate,
}

/// Request to record income
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecordIncome {
    #[validate(length(min = 1, max = 60))]
    pub source: String,
    #[validate(custom(function = "positive_amount"))]
    pub amount: Decimal,
    pub received_on: NaiveDate,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

impl RecordIncome {
    pub fn into_income(self, user_id: UserId, today: NaiveDate) -> Income {
        Income {
            id: IncomeId::new(),
            user_id,
            source: self.source,
            amount: self.amount,
            received_on: self.received_on,
            description: self.description,
            created_at: today,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_record_expense_carries_account() {
        let account_id = AccountId::new();
        let request = RecordExpense {
            category: "Groceries".to_string(),
            amount: dec!(84.20),
            spent_on: date(2024, 3, 2),
            description: Some("weekly shop".to_string()),
            account_id: Some(account_id),
        };
        assert!(request.validate().is_ok());

        let expense = request.into_expense(UserId::new(), date(2024, 3, 3));
        assert_eq!(expense.account_id, Some(account_id));
        assert_eq!(expense.created_at, date(2024, 3, 3));
        assert!(expense.id.to_string().starts_with("EXP-"));
    }

    #[test]
    fn test_expense_requests_need_category_and_amount() {
        let request = RecordExpense {
            category: String::new(),
            amount: dec!(0),
            spent_on: date(2024, 3, 2),
            description: None,
            account_id: None,
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("category"));
        assert!(errors.field_errors().contains_key("amount"));

        let expense = Expense::new(UserId::new(), " ", dec!(10), date(2024, 3, 2), date(2024, 3, 2));
        assert!(matches!(expense.validate(), Err(DepositError::InvalidExpense(_))));
    }

    #[test]
    fn test_income_request_rejects_negative_amount() {
        let request = RecordIncome {
            source: "Salary".to_string(),
            amount: dec!(-1),
            received_on: date(2024, 3, 1),
            description: None,
        };
        assert!(request.validate().unwrap_err().field_errors().contains_key("amount"));
    }
}
