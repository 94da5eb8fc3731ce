use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::generation::{Generational, CURRENT_MARKER};
use super::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Bank,
    Credit,
    Investment,
    #[default]
    #[serde(other)]
    Other,
}

impl AccountType {
    /// Sign relating display balance and net-worth value.
    ///
    /// Credit balances are displayed positive-as-owed, so they count
    /// negatively toward net worth.
    pub fn balance_sign(self) -> Decimal {
        match self {
            AccountType::Credit => Decimal::NEGATIVE_ONE,
            _ => Decimal::ONE,
        }
    }

    pub fn value_from_balance(self, current_balance: Decimal) -> Decimal {
        current_balance * self.balance_sign()
    }

    pub fn balance_from_value(self, value: Decimal) -> Decimal {
        value * self.balance_sign()
    }

    pub fn is_bank_or_credit(self) -> bool {
        matches!(self, AccountType::Bank | AccountType::Credit)
    }
}

/// Rolling balance deltas, named the way they are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PerformanceWindow {
    Week,
    Month,
    Quarter,
    Year,
}

impl PerformanceWindow {
    pub const ALL: [PerformanceWindow; 4] = [
        PerformanceWindow::Week,
        PerformanceWindow::Month,
        PerformanceWindow::Quarter,
        PerformanceWindow::Year,
    ];

    pub fn days(self) -> u32 {
        match self {
            PerformanceWindow::Week => 7,
            PerformanceWindow::Month => 30,
            PerformanceWindow::Quarter => 90,
            PerformanceWindow::Year => 365,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Performance {
    #[serde(default, rename = "last7days")]
    pub last_7_days: Decimal,
    #[serde(default, rename = "last30days")]
    pub last_30_days: Decimal,
    #[serde(default, rename = "last90days")]
    pub last_90_days: Decimal,
    #[serde(default, rename = "last365days")]
    pub last_365_days: Decimal,
}

impl Performance {
    pub fn get(&self, window: PerformanceWindow) -> Decimal {
        match window {
            PerformanceWindow::Week => self.last_7_days,
            PerformanceWindow::Month => self.last_30_days,
            PerformanceWindow::Quarter => self.last_90_days,
            PerformanceWindow::Year => self.last_365_days,
        }
    }

    pub fn set(&mut self, window: PerformanceWindow, value: Decimal) {
        let slot = match window {
            PerformanceWindow::Week => &mut self.last_7_days,
            PerformanceWindow::Month => &mut self.last_30_days,
            PerformanceWindow::Quarter => &mut self.last_90_days,
            PerformanceWindow::Year => &mut self.last_365_days,
        };
        *slot = value;
    }
}

/// A financial account as last reported by the aggregator.
///
/// `value` is the signed contribution to net worth and is the only field
/// used for arithmetic; `current_balance` is for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Id,
    pub account_name: String,
    pub fi_name: String,
    #[serde(default)]
    pub account_type: AccountType,
    pub current_balance: Decimal,
    pub value: Decimal,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub last_updated: i64,
    #[serde(default)]
    pub generation_marker: i64,
    #[serde(flatten)]
    pub performance: Performance,
}

impl Account {
    /// An active account in the current generation, valued from its balance.
    pub fn new(
        id: impl Into<Id>,
        account_name: impl Into<String>,
        fi_name: impl Into<String>,
        account_type: AccountType,
        current_balance: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            account_name: account_name.into(),
            fi_name: fi_name.into(),
            account_type,
            current_balance,
            value: account_type.value_from_balance(current_balance),
            is_active: true,
            last_updated: 0,
            generation_marker: CURRENT_MARKER,
            performance: Performance::default(),
        }
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

impl Generational for Account {
    fn generation_marker(&self) -> i64 {
        self.generation_marker
    }
}

/// Synthetic pseudo-accounts whose history is summed from real accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateAccount {
    NetWorth,
    BankAndCredit,
    Other,
}

impl AggregateAccount {
    pub const ALL: [AggregateAccount; 3] = [
        AggregateAccount::NetWorth,
        AggregateAccount::BankAndCredit,
        AggregateAccount::Other,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AggregateAccount::NetWorth => "net worth",
            AggregateAccount::BankAndCredit => "bank & credit",
            AggregateAccount::Other => "other",
        }
    }

    pub fn id(self) -> Id {
        Id::from(self.name())
    }

    pub fn includes(self, account_type: AccountType) -> bool {
        match self {
            AggregateAccount::NetWorth => true,
            AggregateAccount::BankAndCredit => account_type.is_bank_or_credit(),
            AggregateAccount::Other => !account_type.is_bank_or_credit(),
        }
    }
}
