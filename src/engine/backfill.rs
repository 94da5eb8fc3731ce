//! Weekly balance history reconstructed backward from observed snapshots.
//!
//! Real accounts walk back through their own transaction deltas. Aggregate
//! pseudo-accounts instead sum their members' snapshots as of each date, so
//! they must run after the per-account pass.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::models::{Account, AccountTimeSeriesRecord, AggregateAccount, CURRENT_MARKER};
use crate::normalize::days;
use crate::storage::{AccountQuery, SortOrder, Storage, TimeSeriesQuery, TransactionQuery};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub accounts: usize,
    pub records_written: usize,
    pub aggregate_records_written: usize,
    /// Backfill dates that landed on an observed snapshot and were left alone.
    pub observed_preserved: usize,
}

/// Write a reconstructed snapshot unless an observed one already owns its key.
/// Returns whether anything was written.
pub async fn write_backfill(
    storage: &dyn Storage,
    record: &AccountTimeSeriesRecord,
) -> Result<bool> {
    if let Some(existing) = storage.get_time_series(&record.id).await? {
        if !existing.is_backfill {
            return Ok(false);
        }
    }
    storage.upsert_time_series(record).await?;
    Ok(true)
}

fn cleared_for(account: &Account) -> TransactionQuery {
    TransactionQuery::new()
        .for_account(&account.account_name, &account.fi_name)
        .pending(false)
        .marker(CURRENT_MARKER)
}

async fn backfill_account(
    storage: &dyn Storage,
    account: &Account,
    step: i64,
    report: &mut BackfillReport,
) -> Result<()> {
    let earliest = storage
        .find_time_series(&TimeSeriesQuery::for_account(&account.id).backfill(false))
        .await?;
    let Some(earliest) = earliest else {
        debug!(account_id = %account.id, "No observed snapshot to backfill from");
        return Ok(());
    };

    let sign = account.account_type.balance_sign();
    let mut current_ts = earliest.timestamp;
    let mut current_value = earliest.value;

    loop {
        let any_before = storage
            .find_transaction(&cleared_for(account).until(current_ts))
            .await?;
        if any_before.is_none() {
            break;
        }

        let week_ago = current_ts - step;
        let delta: Decimal = storage
            .list_transactions(&cleared_for(account).since(week_ago + 1).until(current_ts))
            .await?
            .iter()
            .map(|t| t.amount_value)
            .sum();
        let value = current_value - delta;

        let record = AccountTimeSeriesRecord::backfill(
            &account.id,
            &account.account_name,
            week_ago,
            value,
            sign,
        );
        if write_backfill(storage, &record).await? {
            report.records_written += 1;
        } else {
            report.observed_preserved += 1;
        }

        current_ts = week_ago;
        current_value = value;
    }

    Ok(())
}

async fn backfill_aggregate(
    storage: &dyn Storage,
    aggregate: AggregateAccount,
    members: &[Account],
    step: i64,
    report: &mut BackfillReport,
) -> Result<()> {
    let id = aggregate.id();
    let earliest = storage
        .find_time_series(&TimeSeriesQuery::for_account(&id).backfill(false))
        .await?;
    let Some(earliest) = earliest else {
        return Ok(());
    };
    let members: Vec<&Account> = members
        .iter()
        .filter(|a| aggregate.includes(a.account_type))
        .collect();

    let mut current_ts = earliest.timestamp;
    loop {
        let week_ago = current_ts - step;
        let mut total = Decimal::ZERO;
        let mut found = false;
        for member in &members {
            let as_of = TimeSeriesQuery::for_account(&member.id)
                .until(week_ago)
                .sorted(SortOrder::Descending);
            if let Some(snapshot) = storage.find_time_series(&as_of).await? {
                total += snapshot.value;
                found = true;
            }
        }
        if !found {
            break;
        }

        let record =
            AccountTimeSeriesRecord::backfill(&id, aggregate.name(), week_ago, total, Decimal::ONE);
        if write_backfill(storage, &record).await? {
            report.aggregate_records_written += 1;
        } else {
            report.observed_preserved += 1;
        }
        current_ts = week_ago;
    }

    Ok(())
}

pub async fn backfill_time_series(storage: &dyn Storage, step_days: u32) -> Result<BackfillReport> {
    anyhow::ensure!(step_days > 0, "Backfill step must be at least one day");
    let step = days(step_days);

    let accounts = storage
        .list_accounts(&AccountQuery::all())
        .await
        .context("Failed to list accounts")?;

    let mut report = BackfillReport {
        accounts: accounts.len(),
        ..BackfillReport::default()
    };
    for account in &accounts {
        backfill_account(storage, account, step, &mut report)
            .await
            .with_context(|| format!("Failed to backfill account {}", account.id))?;
    }

    let active: Vec<Account> = accounts.into_iter().filter(|a| a.is_active).collect();
    for aggregate in AggregateAccount::ALL {
        backfill_aggregate(storage, aggregate, &active, step, &mut report)
            .await
            .with_context(|| format!("Failed to backfill {}", aggregate.name()))?;
    }

    let live = storage
        .compact_time_series()
        .await
        .context("Failed to compact time series")?;

    info!(
        accounts = report.accounts,
        written = report.records_written,
        aggregate_written = report.aggregate_records_written,
        live_records = live,
        "Time-series backfill complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountType, Id, Transaction};
    use crate::normalize::date_timestamp;
    use crate::storage::MemoryStorage;
    use chrono::{Days, NaiveDate};

    fn day0() -> NaiveDate {
        NaiveDate::from_ymd_opt(2016, 3, 1).unwrap()
    }

    fn ts(offset: i64) -> i64 {
        date_timestamp(day0()) + days(1) * offset
    }

    fn tx(id: &str, days_before: u64, cents: i64) -> Transaction {
        Transaction::new(
            id,
            day0().checked_sub_days(Days::new(days_before)).unwrap(),
            "Store",
            Decimal::new(cents, 2),
            "Visa",
            "Chase",
        )
    }

    async fn seed(storage: &MemoryStorage, ty: AccountType, balance: Decimal) -> Result<Account> {
        let account = Account::new("a1", "Visa", "Chase", ty, balance);
        storage.upsert_account(&account).await?;
        storage
            .upsert_time_series(&AccountTimeSeriesRecord::observed(&account, ts(0)))
            .await?;
        Ok(account)
    }

    #[tokio::test]
    async fn single_earlier_transaction_yields_one_record() -> Result<()> {
        let storage = MemoryStorage::new();
        seed(&storage, AccountType::Bank, Decimal::new(10000, 2)).await?;
        storage.upsert_transaction(&tx("t1", 3, -2500)).await?;

        let report = backfill_time_series(&storage, 7).await?;
        assert_eq!(report.records_written, 1);

        let backfilled = storage
            .list_time_series(&TimeSeriesQuery::for_account(&Id::from("a1")).backfill(true))
            .await?;
        assert_eq!(backfilled.len(), 1);
        assert_eq!(backfilled[0].timestamp, ts(-7));
        assert_eq!(backfilled[0].value, Decimal::new(12500, 2));
        assert_eq!(backfilled[0].current_balance, Decimal::new(12500, 2));

        Ok(())
    }

    #[tokio::test]
    async fn credit_balance_is_negated_value() -> Result<()> {
        let storage = MemoryStorage::new();
        // $200 owed; value is -200. A $50 charge last week means $150 owed before it.
        seed(&storage, AccountType::Credit, Decimal::new(20000, 2)).await?;
        storage.upsert_transaction(&tx("t1", 2, -5000)).await?;

        backfill_time_series(&storage, 7).await?;

        let rec = storage
            .find_time_series(&TimeSeriesQuery::for_account(&Id::from("a1")).backfill(true))
            .await?
            .unwrap();
        assert_eq!(rec.value, Decimal::new(-15000, 2));
        assert_eq!(rec.current_balance, Decimal::new(15000, 2));

        Ok(())
    }

    #[tokio::test]
    async fn same_day_transactions_count_toward_prior_week() -> Result<()> {
        let storage = MemoryStorage::new();
        seed(&storage, AccountType::Bank, Decimal::new(10000, 2)).await?;
        storage.upsert_transaction(&tx("today", 0, -1000)).await?;
        storage.upsert_transaction(&tx("week-ago", 7, -500)).await?;
        storage.upsert_transaction(&tx("ten-days", 10, -100)).await?;

        backfill_time_series(&storage, 7).await?;

        let mut records = storage
            .list_time_series(&TimeSeriesQuery::for_account(&Id::from("a1")).backfill(true))
            .await?;
        records.sort_by_key(|r| r.timestamp);
        let values: Vec<(i64, Decimal)> = records.iter().map(|r| (r.timestamp, r.value)).collect();
        assert_eq!(
            values,
            vec![
                (ts(-14), Decimal::new(11600, 2)),
                (ts(-7), Decimal::new(11000, 2)),
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn observed_snapshots_are_never_overwritten() -> Result<()> {
        let storage = MemoryStorage::new();
        let account = seed(&storage, AccountType::Bank, Decimal::new(10000, 2)).await?;
        let observed = AccountTimeSeriesRecord::observed(&account, ts(-7));
        storage.upsert_time_series(&observed).await?;

        let collide = AccountTimeSeriesRecord::backfill(
            &account.id,
            "Visa",
            ts(-7),
            Decimal::ONE,
            Decimal::ONE,
        );
        assert!(!write_backfill(&storage, &collide).await?);
        let kept = storage.get_time_series(&observed.id).await?.unwrap();
        assert_eq!(kept.value, account.value);
        assert!(!kept.is_backfill);

        let elsewhere = AccountTimeSeriesRecord::backfill(
            &account.id,
            "Visa",
            ts(-14),
            Decimal::ONE,
            Decimal::ONE,
        );
        assert!(write_backfill(&storage, &elsewhere).await?);

        Ok(())
    }

    #[tokio::test]
    async fn rerun_overwrites_prior_backfill() -> Result<()> {
        let storage = MemoryStorage::new();
        seed(&storage, AccountType::Bank, Decimal::new(10000, 2)).await?;
        storage.upsert_transaction(&tx("t1", 3, -2500)).await?;

        backfill_time_series(&storage, 7).await?;
        let again = backfill_time_series(&storage, 7).await?;
        assert_eq!(again.records_written, 1);

        let all = storage
            .list_time_series(&TimeSeriesQuery::for_account(&Id::from("a1")))
            .await?;
        assert_eq!(all.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn aggregates_sum_member_snapshots_as_of_each_date() -> Result<()> {
        let storage = MemoryStorage::new();
        let checking = Account::new(
            "c",
            "Checking",
            "Bank",
            AccountType::Bank,
            Decimal::new(500, 0),
        );
        let brokerage = Account::new(
            "b",
            "Brokerage",
            "Vanguard",
            AccountType::Investment,
            Decimal::new(1000, 0),
        );
        for account in [&checking, &brokerage] {
            storage.upsert_account(account).await?;
        }
        let net_worth = AggregateAccount::NetWorth.id();
        storage
            .upsert_time_series(&AccountTimeSeriesRecord::observed_total(
                &net_worth,
                "net worth",
                ts(0),
                Decimal::new(1500, 0),
            ))
            .await?;
        // Checking has history two weeks back, brokerage only nine days.
        for (offset, value) in [(-7, 400), (-14, 300)] {
            storage
                .upsert_time_series(&AccountTimeSeriesRecord::backfill(
                    &checking.id,
                    "Checking",
                    ts(offset),
                    Decimal::new(value, 0),
                    Decimal::ONE,
                ))
                .await?;
        }
        storage
            .upsert_time_series(&AccountTimeSeriesRecord::backfill(
                &brokerage.id,
                "Brokerage",
                ts(-9),
                Decimal::new(900, 0),
                Decimal::ONE,
            ))
            .await?;

        backfill_time_series(&storage, 7).await?;

        let mut records = storage
            .list_time_series(&TimeSeriesQuery::for_account(&net_worth).backfill(true))
            .await?;
        records.sort_by_key(|r| r.timestamp);
        let values: Vec<(i64, Decimal)> = records.iter().map(|r| (r.timestamp, r.value)).collect();
        assert_eq!(
            values,
            vec![
                (ts(-14), Decimal::new(300, 0)),
                (ts(-7), Decimal::new(1300, 0)),
            ]
        );

        Ok(())
    }
}
