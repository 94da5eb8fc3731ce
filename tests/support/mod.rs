#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use thinmint::clock::FixedClock;
use thinmint::models::Transaction;
use thinmint::normalize::format_date;
use thinmint::sync::{Aggregator, RawBatch};
use tokio::sync::Mutex;

pub const DEFAULT_WINDOW: u32 = 10;
pub const WEEK: u32 = 7;

pub fn day0() -> NaiveDate {
    NaiveDate::from_ymd_opt(2016, 3, 1).expect("valid date")
}

pub fn day(offset: i64) -> NaiveDate {
    if offset >= 0 {
        day0() + Days::new(offset as u64)
    } else {
        day0() - Days::new(offset.unsigned_abs())
    }
}

pub fn clock_at(offset: i64) -> Arc<FixedClock> {
    Arc::new(FixedClock::on(day(offset)))
}

pub fn dollars(s: &str) -> Decimal {
    s.parse().expect("valid decimal")
}

/// Cleared, current, unreviewed Visa/Chase transaction.
pub fn visa_tx(id: &str, offset: i64, merchant: &str, amount: &str) -> Transaction {
    Transaction::new(id, day(offset), merchant, dollars(amount), "Visa", "Chase")
}

pub fn raw_account(id: u64, name: &str, fi: &str, account_type: &str, balance: &str) -> Value {
    json!({
        "accountId": id,
        "accountName": name,
        "fiName": fi,
        "accountType": account_type,
        "currentBalance": balance,
        "isActive": true,
    })
}

/// Aggregator-shaped transaction; `amount` is unsigned display text.
pub fn raw_tx(
    id: &str,
    offset: i64,
    merchant: &str,
    amount: &str,
    is_debit: bool,
    is_pending: bool,
) -> Value {
    json!({
        "id": id,
        "date": format_date(day(offset)),
        "merchant": merchant,
        "amount": amount,
        "isDebit": is_debit,
        "isPending": is_pending,
        "account": "Visa",
        "fi": "Chase",
    })
}

/// Serves whatever batch it was last given.
#[derive(Default)]
pub struct MockAggregator {
    batch: Mutex<RawBatch>,
    fail: bool,
}

impl MockAggregator {
    pub fn new(batch: RawBatch) -> Self {
        Self {
            batch: Mutex::new(batch),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            batch: Mutex::new(RawBatch::default()),
            fail: true,
        }
    }

    pub async fn set_batch(&self, batch: RawBatch) {
        *self.batch.lock().await = batch;
    }
}

#[async_trait]
impl Aggregator for MockAggregator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self) -> Result<RawBatch> {
        if self.fail {
            anyhow::bail!("aggregator unavailable");
        }
        Ok(self.batch.lock().await.clone())
    }
}
