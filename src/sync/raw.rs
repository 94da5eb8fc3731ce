//! Aggregator-native payloads and their conversion to stored records.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::models::{Account, AccountType, Id, Transaction, TransactionKind};
use crate::normalize::{normalize_date, parse_currency, signed_amount, NormalizeError};

/// A JSON scalar the aggregator is inconsistent about typing.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
}

impl Scalar {
    fn as_text(&self) -> String {
        match self {
            Scalar::Text(s) => s.trim().to_string(),
            Scalar::Number(n) => n.to_string(),
            Scalar::Flag(b) => b.to_string(),
        }
    }

    fn as_flag(&self) -> bool {
        match self {
            Scalar::Flag(b) => *b,
            Scalar::Number(n) => n.as_i64().is_some_and(|v| v != 0),
            Scalar::Text(s) => s.eq_ignore_ascii_case("true"),
        }
    }

    fn as_amount(&self) -> Result<Decimal, NormalizeError> {
        parse_currency(&self.as_text())
    }
}

fn required(field: &'static str, value: &Option<Scalar>) -> Result<String, NormalizeError> {
    value
        .as_ref()
        .map(Scalar::as_text)
        .filter(|s| !s.is_empty())
        .ok_or(NormalizeError::MissingField(field))
}

fn flag(value: &Option<Scalar>, default: bool) -> bool {
    value.as_ref().map_or(default, Scalar::as_flag)
}

fn parse<T: for<'de> Deserialize<'de>>(raw: Value) -> Result<T, NormalizeError> {
    serde_json::from_value(raw).map_err(|e| NormalizeError::Malformed(e.to_string()))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    id: Option<Scalar>,
    date: Option<Scalar>,
    merchant: Option<Scalar>,
    amount: Option<Scalar>,
    is_debit: Option<Scalar>,
    is_pending: Option<Scalar>,
    account: Option<Scalar>,
    fi: Option<Scalar>,
    txn_type: Option<Scalar>,
    category: Option<Scalar>,
}

impl RawTransaction {
    pub fn from_value(raw: Value) -> Result<Self, NormalizeError> {
        parse(raw)
    }

    /// Investment-type metadata arrives either as the numeric code `1` or as
    /// a label mentioning investments.
    fn kind(&self) -> TransactionKind {
        match &self.txn_type {
            Some(Scalar::Number(n)) if n.as_i64() == Some(1) => TransactionKind::Investment,
            Some(Scalar::Text(s)) if s.to_lowercase().contains("invest") => {
                TransactionKind::Investment
            }
            _ => TransactionKind::Standard,
        }
    }

    /// Canonical transaction in the current generation with empty review state.
    pub fn normalize(&self, today: NaiveDate) -> Result<Transaction, NormalizeError> {
        let id = required("id", &self.id)?;
        let date = normalize_date(&required("date", &self.date)?, today)?;
        let merchant = required("merchant", &self.merchant)?;
        let is_debit = flag(&self.is_debit, false);
        let amount_value = signed_amount(&required("amount", &self.amount)?, is_debit)?;
        let account = required("account", &self.account)?;
        let fi = required("fi", &self.fi)?;

        let mut txn = Transaction::new(Id::from(id), date, merchant, amount_value, account, fi)
            .with_kind(self.kind());
        // Zero-amount debits keep the upstream flag.
        txn.is_debit = is_debit;
        txn.is_pending = flag(&self.is_pending, false);
        txn.category = self
            .category
            .as_ref()
            .map(Scalar::as_text)
            .filter(|c| !c.is_empty());
        Ok(txn)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAccount {
    account_id: Option<Scalar>,
    id: Option<Scalar>,
    account_name: Option<Scalar>,
    fi_name: Option<Scalar>,
    account_type: Option<String>,
    current_balance: Option<Scalar>,
    value: Option<Scalar>,
    is_active: Option<Scalar>,
}

fn account_type(raw: Option<&str>) -> AccountType {
    match raw.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("bank") => AccountType::Bank,
        Some("credit") => AccountType::Credit,
        Some("investment") => AccountType::Investment,
        _ => AccountType::Other,
    }
}

impl RawAccount {
    pub fn from_value(raw: Value) -> Result<Self, NormalizeError> {
        parse(raw)
    }

    /// Canonical account in the current generation. `value` is derived from
    /// the balance when the aggregator omits it.
    pub fn normalize(&self) -> Result<Account, NormalizeError> {
        let id = match (&self.account_id, &self.id) {
            (Some(id), _) | (None, Some(id)) => id.as_text(),
            (None, None) => String::new(),
        };
        if id.is_empty() {
            return Err(NormalizeError::MissingField("accountId"));
        }
        let name = required("accountName", &self.account_name)?;
        let fi_name = required("fiName", &self.fi_name)?;
        let balance = self
            .current_balance
            .as_ref()
            .ok_or(NormalizeError::MissingField("currentBalance"))?
            .as_amount()?;

        let mut account = Account::new(
            Id::from(id),
            name,
            fi_name,
            account_type(self.account_type.as_deref()),
            balance,
        );
        if let Some(value) = &self.value {
            account.value = value.as_amount()?;
        }
        account.is_active = flag(&self.is_active, true);
        Ok(account)
    }
}
