//! Carry review state from re-issued transactions to their replacements.
//!
//! When the aggregator deletes and re-creates a transaction, the old record
//! stays stale after ingest while an identical-looking record arrives under a
//! new id. Tags and ack state the user already applied move to the new one.

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::models::{is_stale, Id, Transaction, CURRENT_MARKER};
use crate::storage::{Storage, TransactionQuery};

/// Two or more replacements fit equally well; nothing was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousResync {
    pub marooned_id: Id,
    pub candidates: Vec<Id>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResyncReport {
    pub marooned: usize,
    /// `(marooned, replacement)` pairs.
    pub resynced: Vec<(Id, Id)>,
    pub ambiguous: Vec<AmbiguousResync>,
    pub orphaned: Vec<Id>,
}

/// Reviewed, cleared transactions the latest batch did not refresh.
pub async fn find_marooned(storage: &dyn Storage) -> Result<Vec<Transaction>> {
    let reviewed = storage
        .list_transactions(&TransactionQuery::new().acked(true).pending(false))
        .await
        .context("Failed to list reviewed transactions")?;
    Ok(reviewed
        .into_iter()
        .filter(|t| is_stale(t, CURRENT_MARKER))
        .collect())
}

/// Fresh, unreviewed transactions indistinguishable from `old` on account,
/// date, display amount and pending state.
pub fn replacement_query(old: &Transaction) -> TransactionQuery {
    TransactionQuery::new()
        .for_account(&old.account, &old.fi)
        .on_date(&old.date)
        .with_amount(&old.amount)
        .pending(old.is_pending)
        .acked(false)
        .marker(CURRENT_MARKER)
        .excluding(&old.id)
}

fn carry_review_state(old: &Transaction, replacement: &mut Transaction) {
    replacement.add_tags(&old.tags);
    replacement.has_been_acked = old.has_been_acked;
    replacement.is_resolved = old.is_resolved;
}

pub async fn resync_marooned(storage: &dyn Storage) -> Result<ResyncReport> {
    let marooned = find_marooned(storage).await?;
    let mut report = ResyncReport {
        marooned: marooned.len(),
        ..ResyncReport::default()
    };

    for old in marooned {
        let mut candidates = storage
            .list_transactions(&replacement_query(&old))
            .await?;

        match candidates.len() {
            0 => {
                debug!(transaction_id = %old.id, "No replacement for marooned transaction");
                report.orphaned.push(old.id);
            }
            1 => {
                let mut replacement = candidates.remove(0);
                carry_review_state(&old, &mut replacement);
                storage
                    .update_transaction(&replacement)
                    .await
                    .with_context(|| format!("Failed to resync {}", replacement.id))?;
                debug!(
                    transaction_id = %old.id,
                    replacement_id = %replacement.id,
                    "Resynced marooned transaction"
                );
                report.resynced.push((old.id, replacement.id));
            }
            _ => {
                let ids: Vec<Id> = candidates.into_iter().map(|t| t.id).collect();
                warn!(
                    transaction_id = %old.id,
                    candidates = ids.len(),
                    "Ambiguous replacement for marooned transaction; leaving for review"
                );
                report.ambiguous.push(AmbiguousResync {
                    marooned_id: old.id,
                    candidates: ids,
                });
            }
        }
    }

    info!(
        marooned = report.marooned,
        resynced = report.resynced.len(),
        ambiguous = report.ambiguous.len(),
        "Marooned resync complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::STALE_MARKER;
    use crate::storage::MemoryStorage;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn tx(id: &str) -> Transaction {
        Transaction::new(
            id,
            NaiveDate::from_ymd_opt(2016, 1, 30).unwrap(),
            "Coffee Shop",
            Decimal::new(-450, 2),
            "Checking",
            "Bank",
        )
    }

    #[tokio::test]
    async fn single_replacement_receives_tags_and_ack() -> Result<()> {
        let storage = MemoryStorage::new();
        let mut old = tx("old").acked().with_tags(["coffee"]).with_marker(STALE_MARKER);
        old.is_resolved = true;
        storage.upsert_transaction(&old).await?;
        storage.upsert_transaction(&tx("new")).await?;

        let report = resync_marooned(&storage).await?;
        assert_eq!(report.resynced, vec![(Id::from("old"), Id::from("new"))]);

        let new = storage.get_transaction(&Id::from("new")).await?.unwrap();
        assert!(new.has_been_acked);
        assert!(new.is_resolved);
        assert!(new.tags.contains("coffee"));

        // The marooned record is left alone.
        let old = storage.get_transaction(&Id::from("old")).await?.unwrap();
        assert_eq!(old.generation_marker, STALE_MARKER);

        Ok(())
    }

    #[tokio::test]
    async fn ambiguous_replacements_are_reported_not_resolved() -> Result<()> {
        let storage = MemoryStorage::new();
        storage
            .upsert_transaction(&tx("old").acked().with_tags(["coffee"]).with_marker(STALE_MARKER))
            .await?;
        storage.upsert_transaction(&tx("new-a")).await?;
        storage.upsert_transaction(&tx("new-b")).await?;

        let report = resync_marooned(&storage).await?;
        assert!(report.resynced.is_empty());
        assert_eq!(
            report.ambiguous,
            vec![AmbiguousResync {
                marooned_id: Id::from("old"),
                candidates: vec![Id::from("new-a"), Id::from("new-b")],
            }]
        );
        for id in ["new-a", "new-b"] {
            let t = storage.get_transaction(&Id::from(id)).await?.unwrap();
            assert!(!t.has_been_acked);
            assert!(t.tags.is_empty());
        }

        Ok(())
    }

    #[tokio::test]
    async fn current_or_unreviewed_records_are_not_marooned() -> Result<()> {
        let storage = MemoryStorage::new();
        storage.upsert_transaction(&tx("fresh").acked()).await?;
        storage
            .upsert_transaction(&tx("unreviewed").with_marker(STALE_MARKER))
            .await?;

        let report = resync_marooned(&storage).await?;
        assert_eq!(report.marooned, 0);

        Ok(())
    }

    #[tokio::test]
    async fn different_amount_is_not_a_replacement() -> Result<()> {
        let storage = MemoryStorage::new();
        storage
            .upsert_transaction(&tx("old").acked().with_marker(STALE_MARKER))
            .await?;
        let mut other = tx("new");
        other.amount = "$4.60".to_string();
        storage.upsert_transaction(&other).await?;

        let report = resync_marooned(&storage).await?;
        assert_eq!(report.orphaned, vec![Id::from("old")]);

        Ok(())
    }
}
