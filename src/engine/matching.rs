//! Pending-to-cleared transaction matching.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::models::{Id, PendingTranRef, Transaction, CURRENT_MARKER};
use crate::normalize::days;
use crate::storage::{Storage, TransactionQuery};

/// Allowed relative difference between pending and cleared amounts in the
/// close-match pass, inclusive.
pub const CLOSE_MATCH_TOLERANCE: Decimal = Decimal::from_parts(30, 0, 0, false, 2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    pub pending_id: Id,
    pub cleared_id: Id,
    pub kind: MatchKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchReport {
    pub pending_examined: usize,
    pub already_linked: usize,
    pub matched: Vec<MatchOutcome>,
    pub unresolved: Vec<Id>,
}

/// Case-insensitive mutual-prefix test. Blank merchants never match.
pub fn merchants_match(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.starts_with(&b) || b.starts_with(&a)
}

pub fn is_exact_match(pending: &Transaction, cleared: &Transaction) -> bool {
    merchants_match(&pending.merchant, &cleared.merchant)
        && pending.amount_value == cleared.amount_value
}

pub fn is_close_match(pending: &Transaction, cleared: &Transaction) -> bool {
    let band = pending.amount_value.abs() * CLOSE_MATCH_TOLERANCE;
    merchants_match(&pending.merchant, &cleared.merchant)
        && (cleared.amount_value - pending.amount_value).abs() <= band
}

/// Pick the cleared counterpart of `pending` from `candidates`, which must
/// already be ordered earliest first. An exact match anywhere in the list
/// beats a close match.
pub fn select_match<'a>(
    pending: &Transaction,
    candidates: &'a [Transaction],
) -> Option<(&'a Transaction, MatchKind)> {
    if let Some(c) = candidates.iter().find(|c| is_exact_match(pending, c)) {
        return Some((c, MatchKind::Exact));
    }
    candidates
        .iter()
        .find(|c| is_close_match(pending, c))
        .map(|c| (c, MatchKind::Close))
}

/// Cleared, current, not-yet-linked transactions that could resolve `pending`.
pub fn candidate_query(pending: &Transaction, window_days: u32) -> TransactionQuery {
    TransactionQuery::new()
        .for_account(&pending.account, &pending.fi)
        .since(pending.timestamp)
        .until(pending.timestamp + days(window_days))
        .pending(false)
        .marker(CURRENT_MARKER)
        .linked(false)
}

/// Link every unresolved pending transaction to its cleared counterpart,
/// oldest pending first.
///
/// Only the cleared side is written: it gains the pending side's tags and a
/// `pendingTran` snapshot. Consumed candidates drop out of later lookups
/// because the candidate query excludes linked records.
pub async fn match_pending(storage: &dyn Storage, window_days: u32) -> Result<MatchReport> {
    let pending = storage
        .list_transactions(&TransactionQuery::new().pending(true))
        .await
        .context("Failed to list pending transactions")?;

    let mut report = MatchReport::default();
    for p in pending {
        report.pending_examined += 1;

        let linked = storage
            .find_transaction(&TransactionQuery::new().linked_to(&p.id))
            .await?;
        if linked.is_some() {
            report.already_linked += 1;
            continue;
        }

        let candidates = storage
            .list_transactions(&candidate_query(&p, window_days))
            .await?;
        let Some((cleared, kind)) = select_match(&p, &candidates) else {
            debug!(transaction_id = %p.id, "No cleared match for pending transaction");
            report.unresolved.push(p.id.clone());
            continue;
        };

        let mut cleared = cleared.clone();
        cleared.add_tags(&p.tags);
        cleared.pending_tran = Some(PendingTranRef::of(&p));
        storage
            .update_transaction(&cleared)
            .await
            .with_context(|| format!("Failed to link {} to {}", cleared.id, p.id))?;

        debug!(
            transaction_id = %p.id,
            cleared_id = %cleared.id,
            kind = ?kind,
            "Matched pending transaction"
        );
        report.matched.push(MatchOutcome {
            pending_id: p.id,
            cleared_id: cleared.id,
            kind,
        });
    }

    info!(
        examined = report.pending_examined,
        matched = report.matched.len(),
        unresolved = report.unresolved.len(),
        "Pending matching complete"
    );
    Ok(report)
}
