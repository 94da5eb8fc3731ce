//! In-memory storage implementation for testing.

use std::collections::HashMap;

use anyhow::Result;
use tokio::sync::Mutex;

use crate::models::{
    Account, AccountTimeSeriesRecord, Id, TagMonthSummary, Transaction, STALE_MARKER,
};

use super::{AccountQuery, Storage, TimeSeriesQuery, TransactionQuery};

/// In-memory storage for one user.
#[derive(Default)]
pub struct MemoryStorage {
    transactions: Mutex<HashMap<Id, Transaction>>,
    accounts: Mutex<HashMap<Id, Account>>,
    time_series: Mutex<HashMap<String, AccountTimeSeriesRecord>>,
    tags: Mutex<Vec<String>>,
    tag_months: Mutex<Vec<TagMonthSummary>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn list_transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>> {
        let txns = self.transactions.lock().await;
        Ok(query.apply(txns.values()))
    }

    async fn get_transaction(&self, id: &Id) -> Result<Option<Transaction>> {
        let txns = self.transactions.lock().await;
        Ok(txns.get(id).cloned())
    }

    async fn upsert_transaction(&self, txn: &Transaction) -> Result<()> {
        let mut txns = self.transactions.lock().await;
        txns.insert(txn.id.clone(), txn.clone());
        Ok(())
    }

    async fn update_transaction(&self, txn: &Transaction) -> Result<()> {
        let mut txns = self.transactions.lock().await;
        match txns.get_mut(&txn.id) {
            Some(existing) => {
                *existing = txn.clone();
                Ok(())
            }
            None => anyhow::bail!("Transaction not found: {}", txn.id),
        }
    }

    async fn reset_transaction_markers(&self) -> Result<usize> {
        let mut txns = self.transactions.lock().await;
        for txn in txns.values_mut() {
            txn.generation_marker = STALE_MARKER;
        }
        Ok(txns.len())
    }

    async fn list_accounts(&self, query: &AccountQuery) -> Result<Vec<Account>> {
        let accounts = self.accounts.lock().await;
        Ok(query.apply(accounts.values()))
    }

    async fn get_account(&self, id: &Id) -> Result<Option<Account>> {
        let accounts = self.accounts.lock().await;
        Ok(accounts.get(id).cloned())
    }

    async fn upsert_account(&self, account: &Account) -> Result<()> {
        let mut accounts = self.accounts.lock().await;
        accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    async fn reset_account_markers(&self) -> Result<usize> {
        let mut accounts = self.accounts.lock().await;
        for account in accounts.values_mut() {
            account.generation_marker = STALE_MARKER;
        }
        Ok(accounts.len())
    }

    async fn list_time_series(
        &self,
        query: &TimeSeriesQuery,
    ) -> Result<Vec<AccountTimeSeriesRecord>> {
        let records = self.time_series.lock().await;
        Ok(query.apply(records.values()))
    }

    async fn get_time_series(&self, id: &str) -> Result<Option<AccountTimeSeriesRecord>> {
        let records = self.time_series.lock().await;
        Ok(records.get(id).cloned())
    }

    async fn upsert_time_series(&self, record: &AccountTimeSeriesRecord) -> Result<()> {
        let mut records = self.time_series.lock().await;
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn list_tags(&self) -> Result<Vec<String>> {
        Ok(self.tags.lock().await.clone())
    }

    async fn replace_tags(&self, tags: &[String]) -> Result<()> {
        *self.tags.lock().await = tags.to_vec();
        Ok(())
    }

    async fn list_tag_months(&self) -> Result<Vec<TagMonthSummary>> {
        Ok(self.tag_months.lock().await.clone())
    }

    async fn replace_tag_months(&self, months: &[TagMonthSummary]) -> Result<()> {
        *self.tag_months.lock().await = months.to_vec();
        Ok(())
    }
}
