use anyhow::{Context, Result};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::models::{Account, Performance, PerformanceWindow};
use crate::normalize::days;
use crate::storage::{AccountQuery, SortOrder, Storage, TimeSeriesQuery};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerformanceReport {
    pub accounts_updated: usize,
    /// Windows that fell back to the account's first snapshot.
    pub fallbacks: usize,
    /// Windows with no snapshot at all.
    pub without_history: usize,
}

/// Value of the snapshot a window compares against: the latest one at or
/// before `cutoff`, else the first ever recorded.
async fn baseline_value(
    storage: &dyn Storage,
    account: &Account,
    cutoff: i64,
    report: &mut PerformanceReport,
) -> Result<Option<Decimal>> {
    let as_of = TimeSeriesQuery::for_account(&account.id)
        .until(cutoff)
        .sorted(SortOrder::Descending);
    if let Some(snapshot) = storage.find_time_series(&as_of).await? {
        return Ok(Some(snapshot.value));
    }

    let first = storage
        .find_time_series(&TimeSeriesQuery::for_account(&account.id))
        .await?;
    match first {
        Some(snapshot) => {
            report.fallbacks += 1;
            Ok(Some(snapshot.value))
        }
        None => {
            report.without_history += 1;
            Ok(None)
        }
    }
}

pub async fn account_performance(
    storage: &dyn Storage,
    account: &Account,
    today_timestamp: i64,
    report: &mut PerformanceReport,
) -> Result<Performance> {
    let mut performance = Performance::default();
    for window in PerformanceWindow::ALL {
        let cutoff = today_timestamp - days(window.days());
        let delta = match baseline_value(storage, account, cutoff, report).await? {
            Some(baseline) => account.value - baseline,
            None => Decimal::ZERO,
        };
        performance.set(window, delta);
    }
    Ok(performance)
}

pub async fn update_performance(
    storage: &dyn Storage,
    today_timestamp: i64,
) -> Result<PerformanceReport> {
    let accounts = storage
        .list_accounts(&AccountQuery::active())
        .await
        .context("Failed to list active accounts")?;

    let mut report = PerformanceReport::default();
    for mut account in accounts {
        account.performance =
            account_performance(storage, &account, today_timestamp, &mut report).await?;
        storage.upsert_account(&account).await?;
        debug!(account_id = %account.id, "Updated account performance");
        report.accounts_updated += 1;
    }

    info!(
        accounts = report.accounts_updated,
        fallbacks = report.fallbacks,
        "Performance update complete"
    );
    Ok(report)
}
