mod ingest;
mod raw;
mod service;
mod source;

pub use ingest::{ingest_batch, IngestReport, RecordKind, SkippedRecord};
pub use raw::{RawAccount, RawTransaction};
pub use service::{sync_users, CycleReport, SyncService, UserSync};
pub use source::FileAggregator;

use anyhow::Result;
use serde_json::Value;

/// One download from the aggregator, still in its native field names.
#[derive(Debug, Clone, Default)]
pub struct RawBatch {
    pub accounts: Vec<Value>,
    pub transactions: Vec<Value>,
}

impl RawBatch {
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.transactions.is_empty()
    }
}

/// Source of raw account and transaction payloads for one user.
#[async_trait::async_trait]
pub trait Aggregator: Send + Sync {
    /// Human-readable name for this source
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<RawBatch>;
}
