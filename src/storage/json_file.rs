use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::models::{
    Account, AccountTimeSeriesRecord, Id, IdError, TagMonthSummary, Transaction, STALE_MARKER,
};

use super::{AccountQuery, Storage, TimeSeriesQuery, TransactionQuery};

/// Records stored in an append-only JSONL collection.
trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for Transaction {
    fn key(&self) -> &str {
        self.id.as_str()
    }
}

impl Keyed for Account {
    fn key(&self) -> &str {
        self.id.as_str()
    }
}

impl Keyed for AccountTimeSeriesRecord {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Collapse an append log to one entry per key: last write wins, first position kept.
fn latest_by_key<T: Keyed>(items: Vec<T>) -> Vec<T> {
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut deduped: Vec<T> = Vec::new();
    for item in items {
        if let Some(idx) = by_key.get(item.key()).copied() {
            deduped[idx] = item;
        } else {
            by_key.insert(item.key().to_string(), deduped.len());
            deduped.push(item);
        }
    }
    deduped
}

/// JSON file-based storage for one user.
///
/// Directory structure:
/// ```text
/// data/
///   users/
///     {user}/
///       accounts.jsonl
///       transactions.jsonl
///       time_series.jsonl
///       tags.json
///       tags_by_month.json
/// ```
///
/// Upserts append a full copy of the record; reads keep the last copy per id.
/// Bulk marker resets rewrite the collection compacted, as does
/// [`Storage::compact_time_series`] after each backfill.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    user_dir: PathBuf,
}

impl JsonFileStorage {
    pub fn new(base_path: impl AsRef<Path>, user: &Id) -> Result<Self, IdError> {
        let user = Id::from_string_checked(user.as_str())?;
        Ok(Self {
            user_dir: base_path.as_ref().join("users").join(user.as_str()),
        })
    }

    pub fn user_dir(&self) -> &Path {
        &self.user_dir
    }

    fn accounts_file(&self) -> PathBuf {
        self.user_dir.join("accounts.jsonl")
    }

    fn transactions_file(&self) -> PathBuf {
        self.user_dir.join("transactions.jsonl")
    }

    fn time_series_file(&self) -> PathBuf {
        self.user_dir.join("time_series.jsonl")
    }

    fn tags_file(&self) -> PathBuf {
        self.user_dir.join("tags.json")
    }

    fn tag_months_file(&self) -> PathBuf {
        self.user_dir.join("tags_by_month.json")
    }

    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create directory")?;
        }
        Ok(())
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match fs::read_to_string(path).await {
            Ok(content) => {
                let value = serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse JSON from {}", path.display()))?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context("Failed to read file"),
        }
    }

    async fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        self.ensure_dir(path).await?;
        let content = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
        fs::write(path, content)
            .await
            .context("Failed to write file")?;
        Ok(())
    }

    async fn read_jsonl<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>> {
        let file = match fs::File::open(path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).context("Failed to open file"),
        };

        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut items = Vec::new();

        while let Some(line) = lines.next_line().await.context("Failed to read line")? {
            if line.trim().is_empty() {
                continue;
            }
            let item: T = serde_json::from_str(&line).with_context(|| {
                format!("Failed to parse JSONL line in {}: {}", path.display(), line)
            })?;
            items.push(item);
        }

        Ok(items)
    }

    async fn read_latest<T: DeserializeOwned + Keyed>(&self, path: &Path) -> Result<Vec<T>> {
        Ok(latest_by_key(self.read_jsonl(path).await?))
    }

    async fn append_jsonl<T: Serialize>(&self, path: &Path, items: &[T]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        self.ensure_dir(path).await?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .context("Failed to open file for append")?;

        for item in items {
            let line = serde_json::to_string(item).context("Failed to serialize item")?;
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
        }
        file.flush().await?;

        Ok(())
    }

    async fn rewrite_jsonl<T: Serialize>(&self, path: &Path, items: &[T]) -> Result<()> {
        self.ensure_dir(path).await?;
        let mut content = String::new();
        for item in items {
            content.push_str(&serde_json::to_string(item).context("Failed to serialize item")?);
            content.push('\n');
        }
        let tmp = path.with_extension("jsonl.tmp");
        fs::write(&tmp, content)
            .await
            .context("Failed to write compacted file")?;
        fs::rename(&tmp, path)
            .await
            .context("Failed to replace compacted file")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Storage for JsonFileStorage {
    async fn list_transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>> {
        let txns: Vec<Transaction> = self.read_latest(&self.transactions_file()).await?;
        Ok(query.apply(&txns))
    }

    async fn get_transaction(&self, id: &Id) -> Result<Option<Transaction>> {
        let txns: Vec<Transaction> = self.read_latest(&self.transactions_file()).await?;
        Ok(txns.into_iter().find(|t| &t.id == id))
    }

    async fn upsert_transaction(&self, txn: &Transaction) -> Result<()> {
        self.append_jsonl(&self.transactions_file(), std::slice::from_ref(txn))
            .await
    }

    async fn upsert_transactions(&self, txns: &[Transaction]) -> Result<()> {
        self.append_jsonl(&self.transactions_file(), txns).await
    }

    async fn update_transaction(&self, txn: &Transaction) -> Result<()> {
        if self.get_transaction(&txn.id).await?.is_none() {
            anyhow::bail!("Transaction not found: {}", txn.id);
        }
        self.upsert_transaction(txn).await
    }

    async fn reset_transaction_markers(&self) -> Result<usize> {
        let path = self.transactions_file();
        let mut txns: Vec<Transaction> = self.read_latest(&path).await?;
        if txns.is_empty() {
            return Ok(0);
        }
        for txn in &mut txns {
            txn.generation_marker = STALE_MARKER;
        }
        self.rewrite_jsonl(&path, &txns).await?;
        Ok(txns.len())
    }

    async fn list_accounts(&self, query: &AccountQuery) -> Result<Vec<Account>> {
        let accounts: Vec<Account> = self.read_latest(&self.accounts_file()).await?;
        Ok(query.apply(&accounts))
    }

    async fn get_account(&self, id: &Id) -> Result<Option<Account>> {
        let accounts: Vec<Account> = self.read_latest(&self.accounts_file()).await?;
        Ok(accounts.into_iter().find(|a| &a.id == id))
    }

    async fn upsert_account(&self, account: &Account) -> Result<()> {
        self.append_jsonl(&self.accounts_file(), std::slice::from_ref(account))
            .await
    }

    async fn reset_account_markers(&self) -> Result<usize> {
        let path = self.accounts_file();
        let mut accounts: Vec<Account> = self.read_latest(&path).await?;
        if accounts.is_empty() {
            return Ok(0);
        }
        for account in &mut accounts {
            account.generation_marker = STALE_MARKER;
        }
        self.rewrite_jsonl(&path, &accounts).await?;
        Ok(accounts.len())
    }

    async fn list_time_series(
        &self,
        query: &TimeSeriesQuery,
    ) -> Result<Vec<AccountTimeSeriesRecord>> {
        let records: Vec<AccountTimeSeriesRecord> =
            self.read_latest(&self.time_series_file()).await?;
        Ok(query.apply(&records))
    }

    async fn get_time_series(&self, id: &str) -> Result<Option<AccountTimeSeriesRecord>> {
        let records: Vec<AccountTimeSeriesRecord> =
            self.read_latest(&self.time_series_file()).await?;
        Ok(records.into_iter().find(|r| r.id == id))
    }

    async fn upsert_time_series(&self, record: &AccountTimeSeriesRecord) -> Result<()> {
        self.append_jsonl(&self.time_series_file(), std::slice::from_ref(record))
            .await
    }

    async fn compact_time_series(&self) -> Result<usize> {
        let path = self.time_series_file();
        let records: Vec<AccountTimeSeriesRecord> = self.read_latest(&path).await?;
        if records.is_empty() {
            return Ok(0);
        }
        self.rewrite_jsonl(&path, &records).await?;
        Ok(records.len())
    }

    async fn list_tags(&self) -> Result<Vec<String>> {
        Ok(self.read_json(&self.tags_file()).await?.unwrap_or_default())
    }

    async fn replace_tags(&self, tags: &[String]) -> Result<()> {
        self.write_json(&self.tags_file(), tags).await
    }

    async fn list_tag_months(&self) -> Result<Vec<TagMonthSummary>> {
        Ok(self
            .read_json(&self.tag_months_file())
            .await?
            .unwrap_or_default())
    }

    async fn replace_tag_months(&self, months: &[TagMonthSummary]) -> Result<()> {
        self.write_json(&self.tag_months_file(), months).await
    }
}
