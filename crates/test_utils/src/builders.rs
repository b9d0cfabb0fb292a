//! Test Data Builders
//!
//! Builder patterns for deposits, savings accounts and positions. Tests set
//! only the fields they care about and take defaults from the fixtures.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use core_kernel::UserId;
use domain_deposit::{Deposit, DepositKind, SavingsAccount};
use domain_holding::{AssetClass, Lot, NewLot, Position};

use crate::fixtures::{AmountFixtures, DateFixtures, IdFixtures, StringFixtures};

/// Builder for savings accounts
pub struct AccountBuilder {
    user_id: UserId,
    bank_name: String,
    account_number: Option<String>,
    balance: Decimal,
    opened_on: NaiveDate,
}

impl Default for AccountBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountBuilder {
    pub fn new() -> Self {
        Self {
            user_id: IdFixtures::user_id(),
            bank_name: StringFixtures::bank_name().to_string(),
            account_number: Some(StringFixtures::account_number().to_string()),
            balance: AmountFixtures::opening_balance(),
            opened_on: DateFixtures::schedule_start(),
        }
    }

    pub fn owned_by(mut self, user_id: UserId) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = balance;
        self
    }

    pub fn opened_on(mut self, date: NaiveDate) -> Self {
        self.opened_on = date;
        self
    }

    pub fn build(self) -> SavingsAccount {
        let account = SavingsAccount::new(self.user_id, self.bank_name, self.balance, self.opened_on);
        match self.account_number {
            Some(number) => account.with_account_number(number),
            None => account,
        }
    }
}

/// Builder for deposits
///
/// Defaults to a recurring deposit of the standard installment, starting
/// January 2024, maturing 2030, not linked and never reconciled.
pub struct DepositBuilder {
    user_id: UserId,
    bank_name: String,
    kind: DepositKind,
    amount: Decimal,
    start_date: Option<NaiveDate>,
    maturity_date: NaiveDate,
    linked_account: Option<SavingsAccount>,
    last_processed_period: Option<NaiveDate>,
    created_at: NaiveDate,
}

impl Default for DepositBuilder {
    fn default() -> Self {
        Self::recurring()
    }
}

impl DepositBuilder {
    pub fn recurring() -> Self {
        Self {
            user_id: IdFixtures::user_id(),
            bank_name: StringFixtures::bank_name().to_string(),
            kind: DepositKind::Recurring,
            amount: AmountFixtures::installment(),
            start_date: Some(DateFixtures::schedule_start()),
            maturity_date: DateFixtures::distant_maturity(),
            linked_account: None,
            last_processed_period: None,
            created_at: DateFixtures::schedule_start(),
        }
    }

    pub fn fixed() -> Self {
        Self {
            kind: DepositKind::Fixed,
            amount: AmountFixtures::fixed_principal(),
            start_date: None,
            ..Self::recurring()
        }
    }

    pub fn owned_by(mut self, user_id: UserId) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = amount;
        self
    }

    pub fn starting(mut self, start: NaiveDate) -> Self {
        self.start_date = Some(start);
        self
    }

    /// Removes the start date so the schedule falls back to the creation date
    pub fn without_start(mut self) -> Self {
        self.start_date = None;
        self
    }

    pub fn maturing(mut self, maturity: NaiveDate) -> Self {
        self.maturity_date = maturity;
        self
    }

    pub fn created_on(mut self, date: NaiveDate) -> Self {
        self.created_at = date;
        self
    }

    /// Links the deposit to an account; the deposit takes the account's owner
    pub fn linked_to(mut self, account: &SavingsAccount) -> Self {
        self.user_id = account.user_id;
        self.linked_account = Some(account.clone());
        self
    }

    /// Marks the given month as already charged
    pub fn processed_through(mut self, period: NaiveDate) -> Self {
        self.last_processed_period = Some(period);
        self
    }

    pub fn build(self) -> Deposit {
        let mut deposit = match self.kind {
            DepositKind::Fixed => Deposit::fixed(
                self.user_id,
                self.bank_name,
                self.amount,
                self.maturity_date,
                self.created_at,
            ),
            DepositKind::Recurring => Deposit::recurring(
                self.user_id,
                self.bank_name,
                self.amount,
                self.maturity_date,
                self.created_at,
            ),
        }
        .with_interest_rate(AmountFixtures::interest_rate());

        deposit.start_date = self.start_date;
        deposit.last_processed_period = self.last_processed_period;
        if let Some(account) = self.linked_account {
            deposit = deposit.linked_to(account.id);
        }
        deposit
    }

    /// Builds the deposit together with a fresh linked account
    pub fn build_linked(self) -> (Deposit, SavingsAccount) {
        let account = AccountBuilder::new()
            .owned_by(self.user_id)
            .opened_on(self.created_at)
            .build();
        let deposit = self.linked_to(&account).build();
        (deposit, account)
    }
}

/// Builder for positions together with their lot log
pub struct PositionBuilder {
    user_id: UserId,
    asset_class: AssetClass,
    name: String,
    symbol: Option<String>,
    lots: Vec<NewLot>,
}

impl PositionBuilder {
    pub fn stock() -> Self {
        Self {
            user_id: IdFixtures::user_id(),
            asset_class: AssetClass::Stock,
            name: StringFixtures::stock_name().to_string(),
            symbol: Some(StringFixtures::stock_symbol().to_string()),
            lots: Vec::new(),
        }
    }

    pub fn mutual_fund() -> Self {
        Self {
            asset_class: AssetClass::MutualFund,
            name: StringFixtures::fund_name().to_string(),
            symbol: None,
            ..Self::stock()
        }
    }

    pub fn owned_by(mut self, user_id: UserId) -> Self {
        self.user_id = user_id;
        self
    }

    /// Adds a purchase on the standard schedule start date
    pub fn with_lot(self, quantity: Decimal, unit_cost: Decimal) -> Self {
        self.with_lot_on(quantity, unit_cost, DateFixtures::schedule_start())
    }

    pub fn with_lot_on(mut self, quantity: Decimal, unit_cost: Decimal, date: NaiveDate) -> Self {
        self.lots.push(NewLot::new(quantity, unit_cost, date));
        self
    }

    /// Opens the position with the first lot and merges the rest in order
    ///
    /// # Panics
    ///
    /// Panics when no lot was added or a lot is invalid
    pub fn build(self) -> (Position, Vec<Lot>) {
        let mut lots = self.lots.into_iter();
        let first = lots.next().expect("PositionBuilder needs at least one lot");
        let opened_on = first.purchase_date;

        let (mut position, opening) =
            Position::open(self.user_id, self.asset_class, self.name, first, opened_on)
                .expect("Failed to open test position");
        position.symbol = self.symbol;

        let mut log = vec![opening];
        for lot in lots {
            let recorded_on = lot.purchase_date;
            log.push(position.add_lot(lot, recorded_on).expect("Failed to add test lot"));
        }
        (position, log)
    }
}
