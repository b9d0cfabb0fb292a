//! Workflow tests across the deposit and holding domains
//!
//! These run the services over the in-memory stores, the way a request
//! handler or the sweep job drives them.

use std::sync::Arc;

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{months_between, UserId};
use domain_deposit::{
    CreateDeposit, DepositError, DepositKind, DepositPort, DepositService, MockDepositPort,
    OpenAccount,
};
use domain_holding::{AssetClass, HoldingService, MockHoldingPort, NewLot, OpenPosition};
use test_utils::{
    assert_cents, assert_charged, assert_err_variant, assert_processed_through,
    assert_replay_matches, assert_watermark_valid, installment_strategy, lot_sequence_strategy,
    schedule_strategy, AccountBuilder, AmountFixtures, DateFixtures, DepositBuilder, IdFixtures,
    StringFixtures,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn open_account_request(balance: Decimal) -> OpenAccount {
    OpenAccount {
        bank_name: StringFixtures::bank_name().to_string(),
        account_number: Some(StringFixtures::account_number().to_string()),
        balance,
        interest_rate: dec!(2.7),
    }
}

fn recurring_request(amount: Decimal, start: NaiveDate, account: Option<core_kernel::AccountId>) -> CreateDeposit {
    CreateDeposit {
        bank_name: StringFixtures::bank_name().to_string(),
        kind: DepositKind::Recurring,
        amount,
        interest_rate: AmountFixtures::interest_rate(),
        start_date: Some(start),
        maturity_date: DateFixtures::distant_maturity(),
        linked_account_id: account,
    }
}

// ============================================================================
// Recurring deposit lifecycle
// ============================================================================

mod deposit_lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_open_then_catch_up_on_list() {
        let port = Arc::new(MockDepositPort::new());
        let service = DepositService::new(port.clone());
        let user = IdFixtures::user_id();

        let account = service
            .open_account(user, open_account_request(dec!(100000)), date(2024, 1, 1))
            .await
            .unwrap();
        let deposit = service
            .open_deposit(user, recurring_request(dec!(1500), date(2024, 1, 1), Some(account.id)), date(2024, 1, 10))
            .await
            .unwrap();

        assert_processed_through(&deposit, date(2024, 1, 1));
        assert_eq!(port.get_account(account.id).await.unwrap().balance, dec!(98500));

        let overview = service.list_deposits(user, DateFixtures::four_months_in()).await.unwrap();
        assert_eq!(overview.applied.len(), 1);
        assert_eq!(overview.applied[0].installments, 3);
        assert_eq!(overview.total_deducted(), dec!(4500));
        assert_processed_through(&overview.deposits[0], date(2024, 4, 1));

        let stored = service.get_account(user, account.id).await.unwrap();
        assert_eq!(stored.balance, dec!(94000));
    }

    #[tokio::test]
    async fn test_deleted_account_is_skipped_not_charged() {
        let port = Arc::new(MockDepositPort::new());
        let service = DepositService::new(port.clone());
        let user = IdFixtures::user_id();

        let account = service
            .open_account(user, open_account_request(dec!(5000)), date(2024, 1, 1))
            .await
            .unwrap();
        let deposit = service
            .open_deposit(user, recurring_request(dec!(500), date(2024, 1, 1), Some(account.id)), date(2024, 1, 1))
            .await
            .unwrap();
        service.delete_account(user, account.id).await.unwrap();

        let overview = service.list_deposits(user, date(2024, 6, 1)).await.unwrap();
        assert!(overview.applied.is_empty());
        assert_eq!(overview.skipped[0].deposit_id, deposit.id);
        assert_eq!(overview.skipped[0].account_id, Some(account.id));
        assert_processed_through(&overview.deposits[0], date(2024, 1, 1));
    }

    #[tokio::test]
    async fn test_cannot_link_another_users_account() {
        let service = DepositService::new(Arc::new(MockDepositPort::new()));

        let foreign = service
            .open_account(IdFixtures::other_user_id(), open_account_request(dec!(5000)), date(2024, 1, 1))
            .await
            .unwrap();
        let result = service
            .open_deposit(
                IdFixtures::user_id(),
                recurring_request(dec!(500), date(2024, 1, 1), Some(foreign.id)),
                date(2024, 1, 1),
            )
            .await;

        assert!(matches!(result, Err(DepositError::LinkedAccountNotFound(_))));
    }

    #[tokio::test]
    async fn test_cannot_link_unknown_account() {
        let service = DepositService::new(Arc::new(MockDepositPort::new()));

        let result = service
            .open_deposit(
                IdFixtures::user_id(),
                recurring_request(dec!(500), date(2024, 1, 1), Some(IdFixtures::unknown_account_id())),
                date(2024, 1, 1),
            )
            .await;

        assert_err_variant!(result, DepositError::LinkedAccountNotFound(_));
    }

    #[tokio::test]
    async fn test_schedule_without_start_runs_from_creation() {
        let account = AccountBuilder::new().with_balance(dec!(2000)).build();
        let deposit = DepositBuilder::recurring()
            .without_start()
            .created_on(DateFixtures::leap_day())
            .with_amount(dec!(250))
            .linked_to(&account)
            .build();
        let port = Arc::new(MockDepositPort::with_records(vec![account.clone()], vec![deposit.clone()]).await);
        let service = DepositService::new(port.clone());

        let overview = service.list_deposits(account.user_id, DateFixtures::four_months_in()).await.unwrap();

        // February through April
        assert_eq!(overview.applied[0].installments, 3);
        assert_processed_through(&overview.deposits[0], date(2024, 4, 1));
        assert_charged(&account, &port.get_account(account.id).await.unwrap(), &deposit, 3);
    }

    #[tokio::test]
    async fn test_charges_stop_at_maturity_month() {
        let account = AccountBuilder::new().build();
        let deposit = DepositBuilder::recurring()
            .maturing(DateFixtures::march_maturity())
            .linked_to(&account)
            .build();
        let port = Arc::new(MockDepositPort::with_records(vec![account.clone()], vec![deposit.clone()]).await);
        let service = DepositService::new(port.clone());
        let today = date(2024, 6, 15);

        let overview = service.list_deposits(account.user_id, today).await.unwrap();

        assert_processed_through(&overview.deposits[0], date(2024, 3, 1));
        assert_watermark_valid(&overview.deposits[0], today);
        assert_charged(&account, &port.get_account(account.id).await.unwrap(), &deposit, 3);

        let again = service.list_deposits(account.user_id, date(2024, 9, 1)).await.unwrap();
        assert!(again.applied.is_empty());
    }
}

// ============================================================================
// Deposits and positions side by side
// ============================================================================

mod portfolio {
    use super::*;

    #[tokio::test]
    async fn test_user_with_deposits_and_positions() {
        let deposits = DepositService::new(Arc::new(MockDepositPort::new()));
        let holdings = HoldingService::new(Arc::new(MockHoldingPort::new()));
        let user = UserId::new();
        let today = date(2024, 2, 15);

        let account = deposits.open_account(user, open_account_request(dec!(20000)), today).await.unwrap();
        deposits
            .open_deposit(user, recurring_request(dec!(1000), date(2024, 2, 1), Some(account.id)), today)
            .await
            .unwrap();

        let fund = holdings
            .open_position(
                user,
                OpenPosition {
                    asset_class: AssetClass::MutualFund,
                    name: StringFixtures::fund_name().to_string(),
                    symbol: None,
                    first_lot: NewLot::new(dec!(120.5), dec!(61.2345), today),
                },
                today,
            )
            .await
            .unwrap();
        let (fund, _) = holdings
            .add_lot(user, fund.id, NewLot::new(dec!(30), dec!(64.01), date(2024, 3, 5)), date(2024, 3, 5))
            .await
            .unwrap();

        assert_cents(fund.unit_cost);
        let lots = holdings.lots(user, fund.id).await.unwrap();
        assert_replay_matches(&fund, &lots);
        assert!(holdings.audit_position(user, fund.id).await.unwrap().is_consistent());

        let overview = deposits.list_deposits(user, date(2024, 3, 5)).await.unwrap();
        assert_eq!(overview.total_deducted(), dec!(1000));
        assert!(holdings.list_positions(user, Some(AssetClass::Stock)).await.unwrap().is_empty());
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn opening_plus_list_charges_every_elapsed_month(
        (start, today) in schedule_strategy(60),
        installment in installment_strategy(),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let port = Arc::new(MockDepositPort::new());
            let service = DepositService::new(port.clone());
            let user = UserId::new();
            let opening_balance = installment * dec!(100);

            let account = service.open_account(user, open_account_request(opening_balance), start).await.unwrap();
            let mut request = recurring_request(installment, start, Some(account.id));
            request.maturity_date = date(2100, 1, 1);
            service.open_deposit(user, request, start).await.unwrap();
            let overview = service.list_deposits(user, today).await.unwrap();

            let months = Decimal::from(months_between(start, today) + 1);
            let balance = port.get_account(account.id).await.unwrap().balance;
            assert_eq!(balance, opening_balance - installment * months);
            assert_watermark_valid(&overview.deposits[0], today);
        });
    }

    #[test]
    fn added_lots_always_replay(lots in lot_sequence_strategy(12)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let service = HoldingService::new(Arc::new(MockHoldingPort::new()));
            let user = UserId::new();
            let today = date(2024, 1, 2);

            let first = lots[0];
            let mut position = service
                .open_position(
                    user,
                    OpenPosition {
                        asset_class: AssetClass::Stock,
                        name: StringFixtures::stock_name().to_string(),
                        symbol: Some(StringFixtures::stock_symbol().to_string()),
                        first_lot: NewLot::new(first.quantity, first.unit_cost, today),
                    },
                    today,
                )
                .await
                .unwrap();
            for lot in &lots[1..] {
                position = service
                    .add_lot(user, position.id, NewLot::new(lot.quantity, lot.unit_cost, today), today)
                    .await
                    .unwrap()
                    .0;
            }

            let log = service.lots(user, position.id).await.unwrap();
            assert_eq!(log.len(), lots.len());
            assert_replay_matches(&position, &log);
        });
    }
}
