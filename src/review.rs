//! Review queue helpers and plain-text summaries.

use anyhow::{Context, Result};

use crate::format::format_currency;
use crate::models::{Account, Transaction};
use crate::storage::{Storage, TransactionQuery};

/// Transactions the user has not reviewed yet, oldest first.
pub async fn list_unacked(storage: &dyn Storage) -> Result<Vec<Transaction>> {
    storage
        .list_transactions(&TransactionQuery::new().acked(false))
        .await
        .context("Failed to list unreviewed transactions")
}

/// Mark every unreviewed transaction reviewed. Returns how many changed.
pub async fn ack_all(storage: &dyn Storage) -> Result<usize> {
    let pending_review = list_unacked(storage).await?;
    let count = pending_review.len();
    for mut txn in pending_review {
        txn.has_been_acked = true;
        storage.update_transaction(&txn).await?;
    }
    tracing::info!(count, "Acknowledged transactions");
    Ok(count)
}

/// `01/30/16 Chase: Visa - Amazon $45.00 (pending)`; credits carry a `+`.
pub fn format_transaction_line(txn: &Transaction) -> String {
    let sign = if txn.is_debit { "" } else { "+" };
    let pending = if txn.is_pending { " (pending)" } else { "" };
    format!(
        "{} {}: {} - {} {}{}{}",
        txn.date, txn.fi, txn.account, txn.merchant, sign, txn.amount, pending
    )
}

/// `Chase: Visa - $1,234.56`
pub fn format_account_line(account: &Account) -> String {
    format!(
        "{}: {} - {}",
        account.fi_name,
        account.account_name,
        format_currency(account.current_balance)
    )
}
