//! Tag taxonomy and tags-by-month totals, rebuilt from transactions.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use tracing::info;

use crate::models::{TagMonthSummary, Transaction, CURRENT_MARKER};
use crate::normalize::year_month;
use crate::storage::{Storage, TransactionQuery};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Taxonomy {
    /// Sorted, distinct.
    pub tags: Vec<String>,
    /// Sorted by tag, then month.
    pub months: Vec<TagMonthSummary>,
}

pub fn summarize_tags<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Taxonomy {
    let mut tags = BTreeSet::new();
    let mut months: BTreeMap<(String, String), (Decimal, u64)> = BTreeMap::new();

    for txn in transactions {
        let month = year_month(txn.timestamp);
        for tag in &txn.tags {
            tags.insert(tag.clone());
            let entry = months
                .entry((tag.clone(), month.clone()))
                .or_insert((Decimal::ZERO, 0));
            entry.0 += txn.amount_value;
            entry.1 += 1;
        }
    }

    Taxonomy {
        tags: tags.into_iter().collect(),
        months: months
            .into_iter()
            .map(|((tag, year_month), (amount, count))| TagMonthSummary {
                tag,
                year_month,
                amount,
                count,
            })
            .collect(),
    }
}

/// Replace the stored taxonomy with one derived from reviewed, tagged,
/// cleared transactions of the current generation.
pub async fn rebuild_taxonomy(storage: &dyn Storage) -> Result<Taxonomy> {
    let query = TransactionQuery::new()
        .acked(true)
        .tagged(true)
        .pending(false)
        .marker(CURRENT_MARKER);
    let transactions = storage
        .list_transactions(&query)
        .await
        .context("Failed to list tagged transactions")?;

    let taxonomy = summarize_tags(&transactions);
    storage.replace_tags(&taxonomy.tags).await?;
    storage.replace_tag_months(&taxonomy.months).await?;

    info!(
        tags = taxonomy.tags.len(),
        months = taxonomy.months.len(),
        "Tag taxonomy rebuilt"
    );
    Ok(taxonomy)
}
