//! Automatic tagging of unreviewed transactions.

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::models::{Id, Transaction, TransactionKind};
use crate::storage::{SortOrder, Storage, TransactionQuery};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagReport {
    pub examined: usize,
    pub auto_tagged: Vec<Id>,
    /// `(transaction, source)` pairs for carried-forward tags.
    pub carried_forward: Vec<(Id, Id)>,
}

/// The most recent reviewed transaction from the same merchant at or before `txn`.
pub fn prior_reviewed_query(txn: &Transaction) -> TransactionQuery {
    TransactionQuery::new()
        .merchant(&txn.merchant)
        .acked(true)
        .until(txn.timestamp)
        .excluding(&txn.id)
        .sorted(SortOrder::Descending)
}

pub async fn propagate_tags(storage: &dyn Storage, investment_tag: &str) -> Result<TagReport> {
    let unreviewed = storage
        .list_transactions(&TransactionQuery::new().acked(false))
        .await
        .context("Failed to list unreviewed transactions")?;

    let mut report = TagReport::default();
    for mut txn in unreviewed {
        report.examined += 1;
        let had_tags = !txn.tags.is_empty();
        let mut changed = false;

        if txn.kind == TransactionKind::Investment && txn.tags.insert(investment_tag.to_string())
        {
            report.auto_tagged.push(txn.id.clone());
            changed = true;
        }

        if !had_tags {
            if let Some(prior) = storage.find_transaction(&prior_reviewed_query(&txn)).await? {
                if txn.add_tags(&prior.tags) {
                    debug!(
                        transaction_id = %txn.id,
                        source_id = %prior.id,
                        "Carried tags forward"
                    );
                    report.carried_forward.push((txn.id.clone(), prior.id));
                    changed = true;
                }
            }
        }

        if changed {
            storage.update_transaction(&txn).await?;
        }
    }

    info!(
        examined = report.examined,
        auto_tagged = report.auto_tagged.len(),
        carried_forward = report.carried_forward.len(),
        "Tag propagation complete"
    );
    Ok(report)
}
