//! Sweep job tests over the in-memory deposit store

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal_macros::dec;

use core_kernel::{ConflictRetry, UserId};
use domain_deposit::{
    Deposit, DepositPort, DepositServiceSettings, MissingAccountPolicy, MockDepositPort,
    SavingsAccount,
};
use interface_worker::run_sweep;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn seeded_port() -> (Arc<MockDepositPort>, SavingsAccount, Deposit, Deposit) {
    let user = UserId::new();
    let account = SavingsAccount::new(user, "Axis", dec!(20000), date(2024, 1, 1));
    let behind = Deposit::recurring(user, "Axis", dec!(2000), date(2027, 1, 1), date(2024, 1, 1))
        .with_start_date(date(2024, 1, 1))
        .linked_to(account.id);
    let orphaned = Deposit::recurring(user, "Axis", dec!(700), date(2027, 1, 1), date(2024, 1, 1))
        .with_start_date(date(2024, 1, 1))
        .linked_to(SavingsAccount::new(user, "Gone", dec!(0), date(2024, 1, 1)).id);

    let port = MockDepositPort::with_records(vec![account.clone()], vec![behind.clone(), orphaned.clone()]).await;
    (Arc::new(port), account, behind, orphaned)
}

#[tokio::test]
async fn test_sweep_charges_and_skips() {
    let (port, account, behind, orphaned) = seeded_port().await;

    let report = run_sweep(port.clone(), DepositServiceSettings::default(), date(2024, 3, 20))
        .await
        .unwrap();

    assert_eq!(report.examined, 2);
    assert_eq!(report.installments(), 3);
    assert_eq!(report.applied[0].deposit_id, behind.id);
    assert_eq!(report.skipped[0].deposit_id, orphaned.id);
    assert!(report.is_clean());

    let stored = port.get_account(account.id).await.unwrap();
    assert_eq!(stored.balance, dec!(14000));
}

#[tokio::test]
async fn test_second_sweep_same_day_charges_nothing() {
    let (port, account, _, _) = seeded_port().await;
    let today = date(2024, 3, 20);

    run_sweep(port.clone(), DepositServiceSettings::default(), today).await.unwrap();
    let report = run_sweep(port.clone(), DepositServiceSettings::default(), today).await.unwrap();

    assert_eq!(report.installments(), 0);
    assert_eq!(port.get_account(account.id).await.unwrap().balance, dec!(14000));
}

#[tokio::test]
async fn test_fail_policy_reports_missing_account_as_failure() {
    let (port, _, _, orphaned) = seeded_port().await;
    let settings = DepositServiceSettings {
        retry: ConflictRetry::default(),
        missing_account: MissingAccountPolicy::Fail,
    };

    let report = run_sweep(port, settings, date(2024, 3, 20)).await.unwrap();

    assert!(!report.is_clean());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].deposit_id, orphaned.id);
}

#[tokio::test]
async fn test_store_failure_leaves_deposit_for_next_run() {
    let (port, account, behind, _) = seeded_port().await;
    port.inject_commit_failures(1);

    let report = run_sweep(port.clone(), DepositServiceSettings::default(), date(2024, 3, 20))
        .await
        .unwrap();
    assert_eq!(report.failed[0].deposit_id, behind.id);
    assert_eq!(port.get_account(account.id).await.unwrap().balance, dec!(20000));

    let retry = run_sweep(port.clone(), DepositServiceSettings::default(), date(2024, 3, 21))
        .await
        .unwrap();
    assert_eq!(retry.installments(), 3);
    assert_eq!(port.get_account(account.id).await.unwrap().balance, dec!(14000));
}
