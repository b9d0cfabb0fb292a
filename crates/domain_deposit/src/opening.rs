//! Opening a new deposit
//!
//! A recurring deposit whose start month has already begun is charged its
//! first installment when it is opened, and its watermark is set to the start
//! month. Later months are left to the catch-up reconciliation.

use chrono::NaiveDate;

use core_kernel::first_of_month;
use crate::account::SavingsAccount;
use crate::deposit::Deposit;
use crate::error::DepositError;

/// Records to store for a newly opened deposit
#[derive(Debug, Clone, PartialEq)]
pub struct Opening {
    pub deposit: Deposit,
    /// The linked account after the first installment, if one was charged
    pub debited_account: Option<SavingsAccount>,
}

impl Opening {
    pub fn charged_first_installment(&self) -> bool {
        self.debited_account.is_some()
    }
}

/// Validates a new deposit and charges its first installment when due
///
/// `account` is the resolved linked account. It must match the deposit's link
/// and owner whenever the deposit names one.
///
/// # Errors
///
/// * `DepositError::InvalidDeposit` - the deposit fails validation
/// * `DepositError::LinkedAccountNotFound` - the link does not resolve
/// * `DepositError::Calculation` - the debit overflows
pub fn open_deposit(
    mut deposit: Deposit,
    account: Option<SavingsAccount>,
    today: NaiveDate,
) -> Result<Opening, DepositError> {
    deposit.validate()?;
    deposit.last_processed_period = None;

    let Some(account_id) = deposit.linked_account_id else {
        return Ok(Opening { deposit, debited_account: None });
    };
    let mut account = match account {
        Some(account) if account.id == account_id && account.user_id == deposit.user_id => account,
        _ => return Err(DepositError::LinkedAccountNotFound(account_id.to_string())),
    };
    if !deposit.is_recurring() {
        return Ok(Opening { deposit, debited_account: None });
    }

    let start_period = first_of_month(deposit.effective_start_date());
    if start_period > first_of_month(today) {
        return Ok(Opening { deposit, debited_account: None });
    }

    account.debit(deposit.amount, today)?;
    deposit.last_processed_period = Some(start_period);

    Ok(Opening {
        deposit,
        debited_account: Some(account),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::UserId;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_charges_first_installment_and_sets_watermark() {
        let user = UserId::new();
        let account = SavingsAccount::new(user, "HDFC", dec!(1000), date(2024, 1, 1));
        let deposit = Deposit::recurring(user, "HDFC", dec!(250), date(2025, 1, 1), date(2024, 3, 18))
            .with_start_date(date(2024, 1, 15))
            .linked_to(account.id);

        let opening = open_deposit(deposit, Some(account), date(2024, 3, 18)).unwrap();

        assert!(opening.charged_first_installment());
        assert_eq!(opening.deposit.last_processed_period, Some(date(2024, 1, 1)));
        assert_eq!(opening.debited_account.unwrap().balance, dec!(750));
    }

    #[test]
    fn test_future_start_defers_charge() {
        let user = UserId::new();
        let account = SavingsAccount::new(user, "HDFC", dec!(1000), date(2024, 1, 1));
        let deposit = Deposit::recurring(user, "HDFC", dec!(250), date(2025, 1, 1), date(2024, 3, 18))
            .with_start_date(date(2024, 5, 1))
            .linked_to(account.id);

        let opening = open_deposit(deposit, Some(account), date(2024, 3, 18)).unwrap();

        assert!(!opening.charged_first_installment());
        assert_eq!(opening.deposit.last_processed_period, None);
    }

    #[test]
    fn test_unresolved_link_rejected() {
        let user = UserId::new();
        let stranger = SavingsAccount::new(UserId::new(), "HDFC", dec!(1000), date(2024, 1, 1));
        let deposit = Deposit::recurring(user, "HDFC", dec!(250), date(2025, 1, 1), date(2024, 3, 18))
            .linked_to(stranger.id);

        assert!(matches!(
            open_deposit(deposit.clone(), None, date(2024, 3, 18)),
            Err(DepositError::LinkedAccountNotFound(_))
        ));
        assert!(matches!(
            open_deposit(deposit, Some(stranger), date(2024, 3, 18)),
            Err(DepositError::LinkedAccountNotFound(_))
        ));
    }

    #[test]
    fn test_fixed_deposit_never_charges() {
        let user = UserId::new();
        let deposit = Deposit::fixed(user, "SBI", dec!(50000), date(2027, 1, 1), date(2024, 3, 18));
        let opening = open_deposit(deposit, None, date(2024, 3, 18)).unwrap();
        assert!(!opening.charged_first_installment());
    }

    #[test]
    fn test_invalid_deposit_rejected() {
        let deposit = Deposit::recurring(UserId::new(), " ", dec!(250), date(2025, 1, 1), date(2024, 3, 18));
        assert!(matches!(
            open_deposit(deposit, None, date(2024, 3, 18)),
            Err(DepositError::InvalidDeposit(_))
        ));
    }
}
