use std::sync::Arc;

use anyhow::{Context, Result};

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::engine::{EngineReport, ReconcileEngine};
use crate::models::Id;
use crate::storage::Storage;

use super::{ingest_batch, Aggregator, IngestReport};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub source: String,
    pub ingest: IngestReport,
    pub engine: EngineReport,
}

/// Runs a full sync cycle for one user: fetch, ingest, then every
/// reconciliation stage.
pub struct SyncService {
    storage: Arc<dyn Storage>,
    aggregator: Arc<dyn Aggregator>,
    settings: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl SyncService {
    pub fn new(
        storage: Arc<dyn Storage>,
        aggregator: Arc<dyn Aggregator>,
        settings: EngineConfig,
    ) -> Self {
        Self {
            storage,
            aggregator,
            settings,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn engine(&self) -> ReconcileEngine {
        ReconcileEngine::new(self.storage.clone(), self.settings.clone())
            .with_clock(self.clock.clone())
    }

    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let source = self.aggregator.name().to_string();
        let batch = self
            .aggregator
            .fetch()
            .await
            .with_context(|| format!("Failed to fetch from {source}"))?;

        let ingest = ingest_batch(self.storage.as_ref(), batch, self.clock.as_ref())
            .await
            .context("Ingest failed")?;
        let engine = self.engine().run().await?;

        Ok(CycleReport {
            source,
            ingest,
            engine,
        })
    }
}

/// Everything needed to sync one user; stores are never shared across users.
pub struct UserSync {
    pub user: Id,
    pub storage: Arc<dyn Storage>,
    pub aggregator: Arc<dyn Aggregator>,
}

/// Sync several users concurrently, one task each. A failing user does not
/// affect the others. Results come back in input order.
pub async fn sync_users(
    users: Vec<UserSync>,
    settings: &EngineConfig,
    clock: Arc<dyn Clock>,
) -> Vec<(Id, Result<CycleReport>)> {
    let handles: Vec<_> = users
        .into_iter()
        .map(|u| {
            let service = SyncService::new(u.storage, u.aggregator, settings.clone())
                .with_clock(clock.clone());
            let user = u.user;
            let span_user = user.clone();
            let handle = tokio::spawn(async move {
                let result = service.run_cycle().await;
                match &result {
                    Ok(report) => tracing::info!(
                        user = %span_user,
                        matched = report.engine.matching.matched.len(),
                        skipped = report.ingest.skipped.len(),
                        "Sync cycle complete"
                    ),
                    Err(err) => tracing::warn!(user = %span_user, error = %err, "Sync cycle failed"),
                }
                result
            });
            (user, handle)
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (user, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(join_err) => Err(anyhow::anyhow!("Sync task for {user} failed: {join_err}")),
        };
        results.push((user, result));
    }
    results
}
