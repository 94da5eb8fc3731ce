use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;

use super::{Aggregator, RawBatch};

const ACCOUNTS_FILE: &str = "accounts.json";
const TRANSACTIONS_FILE: &str = "transactions.json";

/// Replays payloads previously downloaded from the aggregator.
///
/// Each file holds either a JSON array of records or an object mapping ids
/// to records. A missing file contributes nothing.
#[derive(Debug, Clone)]
pub struct FileAggregator {
    dir: PathBuf,
}

impl FileAggregator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read_records(&self, name: &str) -> Result<Vec<Value>> {
        let path = self.dir.join(name);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Payload file missing; treating as empty");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        let value: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        match value {
            Value::Array(items) => Ok(items),
            Value::Object(map) => Ok(map.into_iter().map(|(_, v)| v).collect()),
            other => anyhow::bail!(
                "Expected an array or object in {}, found {}",
                path.display(),
                json_kind(&other)
            ),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait::async_trait]
impl Aggregator for FileAggregator {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch(&self) -> Result<RawBatch> {
        Ok(RawBatch {
            accounts: self.read_records(ACCOUNTS_FILE).await?,
            transactions: self.read_records(TRANSACTIONS_FILE).await?,
        })
    }
}
