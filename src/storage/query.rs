//! Predicate and sort language shared by every `Storage` implementation.

use std::cmp::Ordering;

use crate::models::{Account, AccountTimeSeriesRecord, AccountType, Id, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Oldest first; ties broken by ascending id.
    #[default]
    Ascending,
    /// Newest first; ties broken by descending id.
    Descending,
}

impl SortOrder {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}

fn bounded(value: i64, from: Option<i64>, to: Option<i64>) -> bool {
    from.is_none_or(|f| value >= f) && to.is_none_or(|t| value <= t)
}

fn eq_opt<T: PartialEq + ?Sized>(want: Option<&T>, have: &T) -> bool {
    want.is_none_or(|w| w == have)
}

fn finish<T>(mut items: Vec<T>, limit: Option<usize>) -> Vec<T> {
    if let Some(limit) = limit {
        items.truncate(limit);
    }
    items
}

/// Filter over a user's transactions. Unset fields match everything;
/// timestamp bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct TransactionQuery {
    pub account: Option<String>,
    pub fi: Option<String>,
    pub timestamp_from: Option<i64>,
    pub timestamp_to: Option<i64>,
    pub is_pending: Option<bool>,
    pub has_been_acked: Option<bool>,
    pub generation_marker: Option<i64>,
    pub merchant: Option<String>,
    pub date: Option<String>,
    pub amount: Option<String>,
    pub has_tags: Option<bool>,
    pub has_pending_tran: Option<bool>,
    pub pending_tran_id: Option<Id>,
    pub exclude_id: Option<Id>,
    pub sort: SortOrder,
    pub limit: Option<usize>,
}

impl TransactionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_account(mut self, account: &str, fi: &str) -> Self {
        self.account = Some(account.to_string());
        self.fi = Some(fi.to_string());
        self
    }

    pub fn since(mut self, timestamp: i64) -> Self {
        self.timestamp_from = Some(timestamp);
        self
    }

    pub fn until(mut self, timestamp: i64) -> Self {
        self.timestamp_to = Some(timestamp);
        self
    }

    pub fn pending(mut self, is_pending: bool) -> Self {
        self.is_pending = Some(is_pending);
        self
    }

    pub fn acked(mut self, has_been_acked: bool) -> Self {
        self.has_been_acked = Some(has_been_acked);
        self
    }

    pub fn marker(mut self, marker: i64) -> Self {
        self.generation_marker = Some(marker);
        self
    }

    pub fn merchant(mut self, merchant: &str) -> Self {
        self.merchant = Some(merchant.to_string());
        self
    }

    pub fn on_date(mut self, date: &str) -> Self {
        self.date = Some(date.to_string());
        self
    }

    pub fn with_amount(mut self, amount: &str) -> Self {
        self.amount = Some(amount.to_string());
        self
    }

    pub fn tagged(mut self, has_tags: bool) -> Self {
        self.has_tags = Some(has_tags);
        self
    }

    pub fn linked(mut self, has_pending_tran: bool) -> Self {
        self.has_pending_tran = Some(has_pending_tran);
        self
    }

    pub fn linked_to(mut self, pending_id: &Id) -> Self {
        self.pending_tran_id = Some(pending_id.clone());
        self
    }

    pub fn excluding(mut self, id: &Id) -> Self {
        self.exclude_id = Some(id.clone());
        self
    }

    pub fn sorted(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, t: &Transaction) -> bool {
        eq_opt(self.account.as_deref(), t.account.as_str())
            && eq_opt(self.fi.as_deref(), t.fi.as_str())
            && bounded(t.timestamp, self.timestamp_from, self.timestamp_to)
            && eq_opt(self.is_pending.as_ref(), &t.is_pending)
            && eq_opt(self.has_been_acked.as_ref(), &t.has_been_acked)
            && eq_opt(self.generation_marker.as_ref(), &t.generation_marker)
            && eq_opt(self.merchant.as_deref(), t.merchant.as_str())
            && eq_opt(self.date.as_deref(), t.date.as_str())
            && eq_opt(self.amount.as_deref(), t.amount.as_str())
            && self.has_tags.is_none_or(|want| want == !t.tags.is_empty())
            && self
                .has_pending_tran
                .is_none_or(|want| want == t.pending_tran.is_some())
            && self.pending_tran_id.as_ref().is_none_or(|id| {
                t.pending_tran.as_ref().is_some_and(|p| &p.id == id)
            })
            && self.exclude_id.as_ref().is_none_or(|id| &t.id != id)
    }

    /// Filter, sort and truncate an unordered collection.
    pub fn apply<'a>(&self, items: impl IntoIterator<Item = &'a Transaction>) -> Vec<Transaction> {
        let mut out: Vec<Transaction> = items
            .into_iter()
            .filter(|t| self.matches(t))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            self.sort
                .apply(a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)))
        });
        finish(out, self.limit)
    }
}

/// Filter over snapshots. Timestamp bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesQuery {
    pub account_id: Option<Id>,
    pub is_backfill: Option<bool>,
    pub timestamp_from: Option<i64>,
    pub timestamp_to: Option<i64>,
    pub sort: SortOrder,
    pub limit: Option<usize>,
}

impl TimeSeriesQuery {
    pub fn for_account(account_id: &Id) -> Self {
        Self {
            account_id: Some(account_id.clone()),
            ..Self::default()
        }
    }

    pub fn backfill(mut self, is_backfill: bool) -> Self {
        self.is_backfill = Some(is_backfill);
        self
    }

    pub fn since(mut self, timestamp: i64) -> Self {
        self.timestamp_from = Some(timestamp);
        self
    }

    pub fn until(mut self, timestamp: i64) -> Self {
        self.timestamp_to = Some(timestamp);
        self
    }

    pub fn sorted(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, r: &AccountTimeSeriesRecord) -> bool {
        eq_opt(self.account_id.as_ref(), &r.account_id)
            && eq_opt(self.is_backfill.as_ref(), &r.is_backfill)
            && bounded(r.timestamp, self.timestamp_from, self.timestamp_to)
    }

    pub fn apply<'a>(
        &self,
        items: impl IntoIterator<Item = &'a AccountTimeSeriesRecord>,
    ) -> Vec<AccountTimeSeriesRecord> {
        let mut out: Vec<AccountTimeSeriesRecord> = items
            .into_iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            self.sort
                .apply(a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)))
        });
        finish(out, self.limit)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AccountQuery {
    pub is_active: Option<bool>,
    /// Empty means any type.
    pub account_types: Vec<AccountType>,
}

impl AccountQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn active() -> Self {
        Self {
            is_active: Some(true),
            ..Self::default()
        }
    }

    pub fn of_types(mut self, types: impl IntoIterator<Item = AccountType>) -> Self {
        self.account_types = types.into_iter().collect();
        self
    }

    pub fn matches(&self, a: &Account) -> bool {
        eq_opt(self.is_active.as_ref(), &a.is_active)
            && (self.account_types.is_empty() || self.account_types.contains(&a.account_type))
    }

    /// Filter and order by id.
    pub fn apply<'a>(&self, items: impl IntoIterator<Item = &'a Account>) -> Vec<Account> {
        let mut out: Vec<Account> = items
            .into_iter()
            .filter(|a| self.matches(a))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn tx(id: &str, day: u32) -> Transaction {
        Transaction::new(
            id,
            NaiveDate::from_ymd_opt(2016, 1, day).unwrap(),
            "Coffee",
            Decimal::NEGATIVE_ONE,
            "Checking",
            "Bank",
        )
    }

    #[test]
    fn sorts_by_timestamp_then_id() {
        let items = vec![tx("b", 2), tx("a", 2), tx("c", 1)];
        let asc = TransactionQuery::new().apply(&items);
        let ids: Vec<&str> = asc.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);

        let desc = TransactionQuery::new()
            .sorted(SortOrder::Descending)
            .apply(&items);
        let ids: Vec<&str> = desc.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn timestamp_bounds_are_inclusive() {
        let items = vec![tx("a", 1), tx("b", 2), tx("c", 3)];
        let lo = items[1].timestamp;
        let found = TransactionQuery::new().since(lo).until(lo).apply(&items);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.as_str(), "b");
    }

    #[test]
    fn pending_link_predicates() {
        let mut linked = tx("cleared", 2);
        linked.pending_tran = Some(crate::models::PendingTranRef::of(&tx("p1", 1)));
        let items = vec![linked, tx("other", 2)];

        let by_link = TransactionQuery::new()
            .linked_to(&Id::from("p1"))
            .apply(&items);
        assert_eq!(by_link.len(), 1);
        assert_eq!(by_link[0].id.as_str(), "cleared");

        let unlinked = TransactionQuery::new().linked(false).apply(&items);
        assert_eq!(unlinked.len(), 1);
        assert_eq!(unlinked[0].id.as_str(), "other");
    }

    #[test]
    fn limit_truncates_after_sort() {
        let items = vec![tx("a", 3), tx("b", 1), tx("c", 2)];
        let newest = TransactionQuery::new()
            .sorted(SortOrder::Descending)
            .limit(1)
            .apply(&items);
        assert_eq!(newest[0].id.as_str(), "a");
    }
}
