//! Fixed and recurring deposit records
//!
//! A deposit is either a fixed deposit (one principal, no schedule) or a
//! recurring deposit, where `amount` is the installment charged once per
//! calendar month against an optional linked savings account.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use core_kernel::{first_of_month, is_first_of_month, AccountId, DepositId, UserId};
use crate::error::DepositError;

/// Kind of deposit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepositKind {
    /// Fixed deposit: a single principal held until maturity
    #[serde(rename = "FD")]
    Fixed,
    /// Recurring deposit: one installment per calendar month
    #[serde(rename = "RD")]
    Recurring,
}

impl DepositKind {
    /// Returns the short code stored for this kind
    pub fn code(&self) -> &'static str {
        match self {
            DepositKind::Fixed => "FD",
            DepositKind::Recurring => "RD",
        }
    }

    /// Parses a stored short code
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "FD" => Some(DepositKind::Fixed),
            "RD" => Some(DepositKind::Recurring),
            _ => None,
        }
    }
}

/// A deposit held by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
    /// Unique identifier
    pub id: DepositId,
    /// Owner
    pub user_id: UserId,
    /// Bank holding the deposit
    pub bank_name: String,
    /// Fixed or recurring
    pub kind: DepositKind,
    /// Principal for fixed deposits, monthly installment for recurring ones
    pub amount: Decimal,
    /// Annual interest rate in percent (informational)
    pub interest_rate: Decimal,
    /// First scheduled month; falls back to `created_at` when absent
    pub start_date: Option<NaiveDate>,
    /// No installment is charged for months after this date's month
    pub maturity_date: NaiveDate,
    /// Savings account charged for installments
    pub linked_account_id: Option<AccountId>,
    /// First day of the most recently charged month
    pub last_processed_period: Option<NaiveDate>,
    /// Creation date
    pub created_at: NaiveDate,
    /// Last modification date
    pub updated_at: NaiveDate,
    /// Optimistic concurrency version
    pub version: i64,
}

impl Deposit {
    fn new(
        user_id: UserId,
        bank_name: impl Into<String>,
        kind: DepositKind,
        amount: Decimal,
        maturity_date: NaiveDate,
        created_at: NaiveDate,
    ) -> Self {
        Self {
            id: DepositId::new(),
            user_id,
            bank_name: bank_name.into(),
            kind,
            amount,
            interest_rate: Decimal::ZERO,
            start_date: None,
            maturity_date,
            linked_account_id: None,
            last_processed_period: None,
            created_at,
            updated_at: created_at,
            version: 0,
        }
    }

    /// Creates a fixed deposit
    pub fn fixed(
        user_id: UserId,
        bank_name: impl Into<String>,
        principal: Decimal,
        maturity_date: NaiveDate,
        created_at: NaiveDate,
    ) -> Self {
        Self::new(user_id, bank_name, DepositKind::Fixed, principal, maturity_date, created_at)
    }

    /// Creates a recurring deposit charging `installment` per month
    pub fn recurring(
        user_id: UserId,
        bank_name: impl Into<String>,
        installment: Decimal,
        maturity_date: NaiveDate,
        created_at: NaiveDate,
    ) -> Self {
        Self::new(user_id, bank_name, DepositKind::Recurring, installment, maturity_date, created_at)
    }

    /// Sets the schedule start date
    pub fn with_start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self
    }

    /// Sets the interest rate
    pub fn with_interest_rate(mut self, rate: Decimal) -> Self {
        self.interest_rate = rate;
        self
    }

    /// Links a savings account for automatic deductions
    pub fn linked_to(mut self, account_id: AccountId) -> Self {
        self.linked_account_id = Some(account_id);
        self
    }

    pub fn is_recurring(&self) -> bool {
        self.kind == DepositKind::Recurring
    }

    /// Recurring deposit with a linked account, i.e. one the scheduler charges
    pub fn is_scheduled(&self) -> bool {
        self.is_recurring() && self.linked_account_id.is_some()
    }

    /// The monthly installment, for recurring deposits only
    pub fn installment_amount(&self) -> Option<Decimal> {
        self.is_recurring().then_some(self.amount)
    }

    /// Start date of the schedule
    pub fn effective_start_date(&self) -> NaiveDate {
        self.start_date.unwrap_or(self.created_at)
    }

    /// Checks the record's own invariants
    ///
    /// # Errors
    ///
    /// Returns `DepositError::InvalidDeposit` when the bank name is blank, the
    /// amount is not positive, maturity precedes the start, or the watermark is
    /// not a first-of-month date inside the schedule's months
    pub fn validate(&self) -> Result<(), DepositError> {
        if self.bank_name.trim().is_empty() {
            return Err(DepositError::InvalidDeposit("bank name is required".to_string()));
        }
        if self.amount <= Decimal::ZERO {
            return Err(DepositError::InvalidDeposit(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        if self.interest_rate < Decimal::ZERO {
            return Err(DepositError::InvalidDeposit("interest rate cannot be negative".to_string()));
        }
        if self.maturity_date < self.effective_start_date() {
            return Err(DepositError::InvalidDeposit(format!(
                "maturity {} precedes start {}",
                self.maturity_date,
                self.effective_start_date()
            )));
        }
        if let Some(watermark) = self.last_processed_period {
            if !is_first_of_month(watermark) {
                return Err(DepositError::InvalidDeposit(format!(
                    "watermark {} is not the first day of a month",
                    watermark
                )));
            }
            // Months already charged must stay inside the schedule
            if first_of_month(self.maturity_date) < watermark {
                return Err(DepositError::InvalidDeposit(format!(
                    "maturity {} falls before the already charged month {}",
                    self.maturity_date, watermark
                )));
            }
            if first_of_month(self.effective_start_date()) > watermark {
                return Err(DepositError::InvalidDeposit(format!(
                    "start {} falls after the already charged month {}",
                    self.effective_start_date(),
                    watermark
                )));
            }
        }
        Ok(())
    }

    /// Applies user edits; the watermark is never touched
    pub fn apply_changes(&mut self, changes: DepositChanges, today: NaiveDate) {
        self.bank_name = changes.bank_name;
        self.kind = changes.kind;
        self.amount = changes.amount;
        self.interest_rate = changes.interest_rate;
        self.start_date = changes.start_date;
        self.maturity_date = changes.maturity_date;
        self.linked_account_id = changes.linked_account_id;
        self.updated_at = today;
    }
}

pub(crate) fn positive_amount(value: &Decimal) -> Result<(), ValidationError> {
    if *value > Decimal::ZERO {
        Ok(())
    } else {
        Err(ValidationError::new("amount_not_positive"))
    }
}

/// Request to create a deposit
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateDeposit {
    #[validate(length(min = 1, max = 120))]
    pub bank_name: String,
    pub kind: DepositKind,
    #[validate(custom(function = "positive_amount"))]
    pub amount: Decimal,
    #[serde(default)]
    pub interest_rate: Decimal,
    pub start_date: Option<NaiveDate>,
    pub maturity_date: NaiveDate,
    pub linked_account_id: Option<AccountId>,
}

impl CreateDeposit {
    /// Builds the deposit record this request describes
    pub fn into_deposit(self, user_id: UserId, today: NaiveDate) -> Deposit {
        Deposit {
            interest_rate: self.interest_rate,
            start_date: self.start_date,
            linked_account_id: self.linked_account_id,
            ..Deposit::new(user_id, self.bank_name, self.kind, self.amount, self.maturity_date, today)
        }
    }
}

/// Full replacement of a deposit's editable fields
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DepositChanges {
    #[validate(length(min = 1, max = 120))]
    pub bank_name: String,
    pub kind: DepositKind,
    #[validate(custom(function = "positive_amount"))]
    pub amount: Decimal,
    #[serde(default)]
    pub interest_rate: Decimal,
    pub start_date: Option<NaiveDate>,
    pub maturity_date: NaiveDate,
    pub linked_account_id: Option<AccountId>,
}
