use std::collections::BTreeSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::format::format_display_amount;
use crate::normalize::{date_timestamp, format_date};

use super::generation::{Generational, CURRENT_MARKER};
use super::Id;

/// Structured transaction-type metadata supplied by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    #[default]
    Standard,
    Investment,
}

/// Snapshot of the pending transaction a cleared transaction resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTranRef {
    pub id: Id,
    pub date: String,
    pub merchant: String,
    pub amount: String,
}

impl PendingTranRef {
    pub fn of(pending: &Transaction) -> Self {
        Self {
            id: pending.id.clone(),
            date: pending.date.clone(),
            merchant: pending.merchant.clone(),
            amount: pending.amount.clone(),
        }
    }
}

/// One ledger entry in a user's store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Id,
    /// Canonical `mm/dd/yy`.
    pub date: String,
    /// Seconds since epoch at 00:00 UTC of `date`.
    pub timestamp: i64,
    pub merchant: String,
    /// Display amount, unsigned (e.g. `"$12.34"`).
    pub amount: String,
    /// Negative for debits, positive for credits and refunds.
    pub amount_value: Decimal,
    pub account: String,
    pub fi: String,
    #[serde(default)]
    pub is_debit: bool,
    #[serde(default)]
    pub is_pending: bool,
    #[serde(default)]
    pub is_resolved: bool,
    #[serde(default)]
    pub has_been_acked: bool,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, alias = "mintMarker")]
    pub generation_marker: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_tran: Option<PendingTranRef>,
    #[serde(default)]
    pub kind: TransactionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Transaction {
    /// A cleared, unreviewed transaction in the current generation.
    pub fn new(
        id: impl Into<Id>,
        date: NaiveDate,
        merchant: impl Into<String>,
        amount_value: Decimal,
        account: impl Into<String>,
        fi: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            date: format_date(date),
            timestamp: date_timestamp(date),
            merchant: merchant.into(),
            amount: format_display_amount(amount_value),
            amount_value,
            account: account.into(),
            fi: fi.into(),
            is_debit: amount_value.is_sign_negative(),
            is_pending: false,
            is_resolved: false,
            has_been_acked: false,
            tags: BTreeSet::new(),
            generation_marker: CURRENT_MARKER,
            pending_tran: None,
            kind: TransactionKind::Standard,
            category: None,
        }
    }

    pub fn pending(mut self) -> Self {
        self.is_pending = true;
        self
    }

    pub fn acked(mut self) -> Self {
        self.has_been_acked = true;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_marker(mut self, marker: i64) -> Self {
        self.generation_marker = marker;
        self
    }

    pub fn with_kind(mut self, kind: TransactionKind) -> Self {
        self.kind = kind;
        self
    }

    /// Union `tags` into this transaction's tag set. Returns true if anything was added.
    pub fn add_tags<'a>(&mut self, tags: impl IntoIterator<Item = &'a String>) -> bool {
        let before = self.tags.len();
        self.tags.extend(tags.into_iter().cloned());
        self.tags.len() != before
    }

    /// Account and institution names together identify an account.
    pub fn same_account(&self, other: &Transaction) -> bool {
        self.account == other.account && self.fi == other.fi
    }

    /// Overwrite upstream-owned fields from a freshly observed copy of this
    /// record, keeping review state (tags, ack flags, pending link).
    pub fn absorb_upstream(&mut self, upstream: Transaction) {
        self.date = upstream.date;
        self.timestamp = upstream.timestamp;
        self.merchant = upstream.merchant;
        self.amount = upstream.amount;
        self.amount_value = upstream.amount_value;
        self.account = upstream.account;
        self.fi = upstream.fi;
        self.is_debit = upstream.is_debit;
        self.is_pending = upstream.is_pending;
        self.kind = upstream.kind;
        self.category = upstream.category;
        self.generation_marker = upstream.generation_marker;
    }
}

impl Generational for Transaction {
    fn generation_marker(&self) -> i64 {
        self.generation_marker
    }
}
