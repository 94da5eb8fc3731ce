//! Write one aggregator batch into a user's store.

use std::collections::HashMap;
use std::fmt;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::models::{Account, AccountTimeSeriesRecord, AggregateAccount, Id, Transaction};
use crate::normalize::NormalizeError;
use crate::storage::{Storage, TransactionQuery};

use super::{RawAccount, RawBatch, RawTransaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Account,
    Transaction,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Account => f.write_str("account"),
            RecordKind::Transaction => f.write_str("transaction"),
        }
    }
}

/// An upstream record that could not be normalized and was left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub kind: RecordKind,
    /// Position in the batch.
    pub index: usize,
    pub reason: NormalizeError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Records marked stale before the batch was applied.
    pub reset_transactions: usize,
    pub reset_accounts: usize,
    pub accounts: usize,
    pub snapshots: usize,
    pub transactions_inserted: usize,
    pub transactions_refreshed: usize,
    pub skipped: Vec<SkippedRecord>,
}

fn normalize_all<T>(
    kind: RecordKind,
    raw: Vec<Value>,
    convert: impl Fn(Value) -> Result<T, NormalizeError>,
    skipped: &mut Vec<SkippedRecord>,
) -> Vec<T> {
    let mut out = Vec::with_capacity(raw.len());
    for (index, value) in raw.into_iter().enumerate() {
        match convert(value) {
            Ok(record) => out.push(record),
            Err(reason) => {
                warn!(kind = %kind, index, error = %reason, "Skipping upstream record");
                skipped.push(SkippedRecord {
                    kind,
                    index,
                    reason,
                });
            }
        }
    }
    out
}

async fn upsert_accounts(
    storage: &dyn Storage,
    accounts: &[Account],
    now: i64,
) -> Result<()> {
    for account in accounts {
        let mut account = account.clone();
        account.last_updated = now;
        // Performance is derived later in the cycle; keep the last values meanwhile.
        if let Some(existing) = storage.get_account(&account.id).await? {
            account.performance = existing.performance;
        }
        storage
            .upsert_account(&account)
            .await
            .with_context(|| format!("Failed to save account {}", account.id))?;
    }
    Ok(())
}

async fn upsert_observed_snapshots(
    storage: &dyn Storage,
    accounts: &[Account],
    today: i64,
) -> Result<usize> {
    let active: Vec<&Account> = accounts.iter().filter(|a| a.is_active).collect();
    let mut written = 0;

    for account in &active {
        storage
            .upsert_time_series(&AccountTimeSeriesRecord::observed(account, today))
            .await?;
        written += 1;
    }

    for aggregate in AggregateAccount::ALL {
        let total: Decimal = active
            .iter()
            .filter(|a| aggregate.includes(a.account_type))
            .map(|a| a.value)
            .sum();
        let record =
            AccountTimeSeriesRecord::observed_total(&aggregate.id(), aggregate.name(), today, total);
        storage.upsert_time_series(&record).await?;
        written += 1;
    }

    Ok(written)
}

/// Refresh upstream fields of known transactions and insert new ones.
/// Returns `(inserted, refreshed)`.
async fn merge_transactions(
    storage: &dyn Storage,
    transactions: Vec<Transaction>,
) -> Result<(usize, usize)> {
    let mut existing: HashMap<Id, Transaction> = storage
        .list_transactions(&TransactionQuery::new())
        .await
        .context("Failed to load stored transactions")?
        .into_iter()
        .map(|t| (t.id.clone(), t))
        .collect();

    let mut inserted = 0;
    let mut refreshed = 0;
    // A repeated id in one batch refreshes the copy merged earlier in the batch.
    let mut merged = Vec::with_capacity(transactions.len());
    for txn in transactions {
        let record = match existing.remove(&txn.id) {
            Some(mut known) => {
                known.absorb_upstream(txn);
                refreshed += 1;
                known
            }
            None => {
                inserted += 1;
                txn
            }
        };
        existing.insert(record.id.clone(), record.clone());
        merged.push(record);
    }
    storage
        .upsert_transactions(&merged)
        .await
        .context("Failed to save transactions")?;
    Ok((inserted, refreshed))
}

/// Apply `batch` to the store.
///
/// Every existing record is marked stale first, so after this returns the
/// current generation is exactly what the batch contained. Records that fail
/// normalization are reported and skipped; store failures abort.
pub async fn ingest_batch(
    storage: &dyn Storage,
    batch: RawBatch,
    clock: &dyn Clock,
) -> Result<IngestReport> {
    let mut report = IngestReport {
        reset_transactions: storage
            .reset_transaction_markers()
            .await
            .context("Failed to reset transaction markers")?,
        reset_accounts: storage
            .reset_account_markers()
            .await
            .context("Failed to reset account markers")?,
        ..IngestReport::default()
    };

    let today = clock.today();
    let accounts = normalize_all(
        RecordKind::Account,
        batch.accounts,
        |v| RawAccount::from_value(v)?.normalize(),
        &mut report.skipped,
    );
    let transactions = normalize_all(
        RecordKind::Transaction,
        batch.transactions,
        |v| RawTransaction::from_value(v)?.normalize(today),
        &mut report.skipped,
    );

    upsert_accounts(storage, &accounts, clock.now().timestamp()).await?;
    report.accounts = accounts.len();
    report.snapshots =
        upsert_observed_snapshots(storage, &accounts, clock.today_timestamp()).await?;

    let (inserted, refreshed) = merge_transactions(storage, transactions).await?;
    report.transactions_inserted = inserted;
    report.transactions_refreshed = refreshed;

    info!(
        accounts = report.accounts,
        inserted,
        refreshed,
        skipped = report.skipped.len(),
        "Ingested aggregator batch"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::{Id, CURRENT_MARKER, STALE_MARKER};
    use crate::storage::{JsonFileStorage, MemoryStorage, TimeSeriesQuery};
    use chrono::NaiveDate;
    use serde_json::json;

    fn clock() -> FixedClock {
        FixedClock::on(NaiveDate::from_ymd_opt(2016, 2, 10).unwrap())
    }

    fn raw_txn(id: &str, merchant: &str) -> Value {
        json!({
            "id": id, "date": "Feb 8", "merchant": merchant, "amount": "$20.00",
            "isDebit": true, "account": "Checking", "fi": "Bank"
        })
    }

    async fn snapshot_value(storage: &MemoryStorage, id: Id) -> Result<Option<Decimal>> {
        let record = storage
            .find_time_series(&TimeSeriesQuery::for_account(&id))
            .await?;
        Ok(record.map(|r| r.value))
    }

    #[tokio::test]
    async fn bad_records_are_skipped_not_fatal() -> Result<()> {
        let storage = MemoryStorage::new();
        let batch = RawBatch {
            accounts: vec![],
            transactions: vec![
                raw_txn("1", "Coffee"),
                json!({"id": "2", "date": "Feb 8", "amount": "$1.00"}),
                json!({"id": "3", "date": "Feb 31", "merchant": "Bad", "amount": "$1.00",
                       "account": "Checking", "fi": "Bank"}),
                raw_txn("4", "Tea"),
            ],
        };

        let report = ingest_batch(&storage, batch, &clock()).await?;
        assert_eq!(report.transactions_inserted, 2);
        let skipped: Vec<usize> = report.skipped.iter().map(|s| s.index).collect();
        assert_eq!(skipped, vec![1, 2]);
        assert_eq!(
            report.skipped[0].reason,
            NormalizeError::MissingField("merchant")
        );

        Ok(())
    }

    #[tokio::test]
    async fn existing_review_state_survives_refresh() -> Result<()> {
        let storage = MemoryStorage::new();
        ingest_batch(
            &storage,
            RawBatch {
                accounts: vec![],
                transactions: vec![raw_txn("1", "Coffee")],
            },
            &clock(),
        )
        .await?;
        let mut reviewed = storage.get_transaction(&Id::from("1")).await?.unwrap();
        reviewed.has_been_acked = true;
        reviewed.tags.insert("coffee".to_string());
        storage.update_transaction(&reviewed).await?;

        let report = ingest_batch(
            &storage,
            RawBatch {
                accounts: vec![],
                transactions: vec![raw_txn("1", "Coffee Shop")],
            },
            &clock(),
        )
        .await?;
        assert_eq!(report.transactions_refreshed, 1);

        let txn = storage.get_transaction(&Id::from("1")).await?.unwrap();
        assert_eq!(txn.merchant, "Coffee Shop");
        assert!(txn.has_been_acked);
        assert!(txn.tags.contains("coffee"));
        assert_eq!(txn.generation_marker, CURRENT_MARKER);

        Ok(())
    }

    #[tokio::test]
    async fn empty_batch_marks_everything_stale() -> Result<()> {
        let storage = MemoryStorage::new();
        ingest_batch(
            &storage,
            RawBatch {
                accounts: vec![],
                transactions: vec![raw_txn("1", "Coffee")],
            },
            &clock(),
        )
        .await?;

        let report = ingest_batch(&storage, RawBatch::default(), &clock()).await?;
        assert_eq!(report.reset_transactions, 1);
        let txn = storage.get_transaction(&Id::from("1")).await?.unwrap();
        assert_eq!(txn.generation_marker, STALE_MARKER);

        Ok(())
    }

    #[tokio::test]
    async fn observed_snapshots_for_active_accounts_and_aggregates() -> Result<()> {
        let storage = MemoryStorage::new();
        let batch = RawBatch {
            accounts: vec![
                json!({"accountId": 1, "accountName": "Checking", "fiName": "Bank",
                       "accountType": "bank", "currentBalance": "$1,000.00"}),
                json!({"accountId": 2, "accountName": "Visa", "fiName": "Chase",
                       "accountType": "credit", "currentBalance": "$250.00"}),
                json!({"accountId": 3, "accountName": "IRA", "fiName": "Vanguard",
                       "accountType": "investment", "currentBalance": "$5,000.00"}),
                json!({"accountId": 4, "accountName": "Closed", "fiName": "Bank",
                       "accountType": "bank", "currentBalance": "$9.00", "isActive": false}),
            ],
            transactions: vec![],
        };

        let report = ingest_batch(&storage, batch, &clock()).await?;
        assert_eq!(report.accounts, 4);
        assert_eq!(report.snapshots, 6);

        assert_eq!(
            snapshot_value(&storage, AggregateAccount::NetWorth.id()).await?,
            Some(Decimal::new(5750, 0))
        );
        assert_eq!(
            snapshot_value(&storage, AggregateAccount::BankAndCredit.id()).await?,
            Some(Decimal::new(750, 0))
        );
        assert_eq!(
            snapshot_value(&storage, AggregateAccount::Other.id()).await?,
            Some(Decimal::new(5000, 0))
        );
        assert_eq!(snapshot_value(&storage, Id::from("4")).await?, None);

        let checking = storage.get_account(&Id::from("1")).await?.unwrap();
        assert_eq!(checking.last_updated, clock().now().timestamp());

        Ok(())
    }

    #[tokio::test]
    async fn batch_merges_against_one_snapshot_of_the_store() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let storage = JsonFileStorage::new(dir.path(), &Id::from("rob"))?;
        ingest_batch(
            &storage,
            RawBatch {
                accounts: vec![],
                transactions: vec![raw_txn("1", "Coffee")],
            },
            &clock(),
        )
        .await?;

        let report = ingest_batch(
            &storage,
            RawBatch {
                accounts: vec![],
                transactions: vec![
                    raw_txn("1", "Coffee Shop"),
                    raw_txn("2", "Tea"),
                    raw_txn("2", "Tea House"),
                ],
            },
            &clock(),
        )
        .await?;

        assert_eq!(report.transactions_inserted, 1);
        assert_eq!(report.transactions_refreshed, 2);
        let all = storage.list_transactions(&TransactionQuery::new()).await?;
        let merchants: Vec<&str> = all.iter().map(|t| t.merchant.as_str()).collect();
        assert_eq!(merchants.len(), 2);
        assert!(merchants.contains(&"Coffee Shop"));
        assert!(merchants.contains(&"Tea House"));
        assert!(all.iter().all(|t| t.generation_marker == CURRENT_MARKER));

        Ok(())
    }
}
