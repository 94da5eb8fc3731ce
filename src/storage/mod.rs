mod json_file;
mod memory;
mod query;

pub use json_file::JsonFileStorage;
pub use memory::MemoryStorage;
pub use query::{AccountQuery, SortOrder, TimeSeriesQuery, TransactionQuery};

use anyhow::Result;

use crate::models::{Account, AccountTimeSeriesRecord, Id, TagMonthSummary, Transaction};

/// One user's document store.
///
/// Writes are full-document replacements keyed by id (last writer wins).
/// Implementations are scoped to a single user; callers never pass a user id.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    // Transactions
    async fn list_transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>>;
    async fn get_transaction(&self, id: &Id) -> Result<Option<Transaction>>;
    async fn upsert_transaction(&self, txn: &Transaction) -> Result<()>;
    /// Replace an existing transaction; errors if the id is unknown.
    async fn update_transaction(&self, txn: &Transaction) -> Result<()>;
    /// Set every stored transaction's generation marker to stale. Returns the count.
    async fn reset_transaction_markers(&self) -> Result<usize>;

    async fn upsert_transactions(&self, txns: &[Transaction]) -> Result<()> {
        for txn in txns {
            self.upsert_transaction(txn).await?;
        }
        Ok(())
    }

    async fn find_transaction(&self, query: &TransactionQuery) -> Result<Option<Transaction>> {
        let query = query.clone().limit(1);
        Ok(self.list_transactions(&query).await?.into_iter().next())
    }

    // Accounts
    async fn list_accounts(&self, query: &AccountQuery) -> Result<Vec<Account>>;
    async fn get_account(&self, id: &Id) -> Result<Option<Account>>;
    async fn upsert_account(&self, account: &Account) -> Result<()>;
    async fn reset_account_markers(&self) -> Result<usize>;

    // Account time series
    async fn list_time_series(
        &self,
        query: &TimeSeriesQuery,
    ) -> Result<Vec<AccountTimeSeriesRecord>>;
    async fn get_time_series(&self, id: &str) -> Result<Option<AccountTimeSeriesRecord>>;
    async fn upsert_time_series(&self, record: &AccountTimeSeriesRecord) -> Result<()>;

    /// Drop superseded copies of time-series records. Returns the live record count.
    async fn compact_time_series(&self) -> Result<usize> {
        Ok(0)
    }

    async fn find_time_series(
        &self,
        query: &TimeSeriesQuery,
    ) -> Result<Option<AccountTimeSeriesRecord>> {
        let query = query.clone().limit(1);
        Ok(self.list_time_series(&query).await?.into_iter().next())
    }

    // Derived tag taxonomy
    async fn list_tags(&self) -> Result<Vec<String>>;
    async fn replace_tags(&self, tags: &[String]) -> Result<()>;
    async fn list_tag_months(&self) -> Result<Vec<TagMonthSummary>>;
    async fn replace_tag_months(&self, months: &[TagMonthSummary]) -> Result<()>;
}
