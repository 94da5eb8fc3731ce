use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::normalize::format_timestamp;

use super::{Account, Id};

/// One dated balance snapshot for an account or aggregate pseudo-account.
///
/// Unique by `(account_id, date)`; the composite is materialized in `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountTimeSeriesRecord {
    pub id: String,
    pub account_id: Id,
    pub account_name: String,
    pub date: String,
    pub timestamp: i64,
    pub value: Decimal,
    pub current_balance: Decimal,
    /// True when reconstructed from transaction history rather than observed.
    #[serde(default)]
    pub is_backfill: bool,
}

impl AccountTimeSeriesRecord {
    pub fn record_id(account_id: &Id, date: &str) -> String {
        format!("{account_id}.{date}")
    }

    /// Snapshot of an account's balance as reported at sync time.
    pub fn observed(account: &Account, timestamp: i64) -> Self {
        Self::build(
            &account.id,
            &account.account_name,
            timestamp,
            account.value,
            account.current_balance,
            false,
        )
    }

    /// Observed snapshot for a pseudo-account that has no display sign.
    pub fn observed_total(account_id: &Id, name: &str, timestamp: i64, value: Decimal) -> Self {
        Self::build(account_id, name, timestamp, value, value, false)
    }

    /// Reconstructed snapshot; `balance_sign` maps value to display balance.
    pub fn backfill(
        account_id: &Id,
        name: &str,
        timestamp: i64,
        value: Decimal,
        balance_sign: Decimal,
    ) -> Self {
        Self::build(account_id, name, timestamp, value, value * balance_sign, true)
    }

    fn build(
        account_id: &Id,
        name: &str,
        timestamp: i64,
        value: Decimal,
        current_balance: Decimal,
        is_backfill: bool,
    ) -> Self {
        let date = format_timestamp(timestamp);
        Self {
            id: Self::record_id(account_id, &date),
            account_id: account_id.clone(),
            account_name: name.to_string(),
            date,
            timestamp,
            value,
            current_balance,
            is_backfill,
        }
    }
}
