//! Post-ingest reconciliation stages.
//!
//! Every stage re-reads what it needs from [`Storage`] and writes full
//! replacements, so any stage can be re-run after a partial failure.

mod backfill;
mod marooned;
mod matching;
mod performance;
mod tags;
mod taxonomy;

pub use backfill::{backfill_time_series, write_backfill, BackfillReport};
pub use marooned::{find_marooned, replacement_query, resync_marooned, AmbiguousResync, ResyncReport};
pub use matching::{
    candidate_query, is_close_match, is_exact_match, match_pending, merchants_match, select_match,
    MatchKind, MatchOutcome, MatchReport, CLOSE_MATCH_TOLERANCE,
};
pub use performance::{account_performance, update_performance, PerformanceReport};
pub use tags::{prior_reviewed_query, propagate_tags, TagReport};
pub use taxonomy::{rebuild_taxonomy, summarize_tags, Taxonomy};

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::storage::Storage;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineReport {
    pub resync: ResyncReport,
    pub matching: MatchReport,
    pub tags: TagReport,
    pub taxonomy: Taxonomy,
    pub backfill: BackfillReport,
    pub performance: PerformanceReport,
}

pub struct ReconcileEngine {
    storage: Arc<dyn Storage>,
    settings: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl ReconcileEngine {
    pub fn new(storage: Arc<dyn Storage>, settings: EngineConfig) -> Self {
        Self {
            storage,
            settings,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &EngineConfig {
        &self.settings
    }

    pub async fn resync_marooned(&self) -> Result<ResyncReport> {
        resync_marooned(self.storage.as_ref()).await
    }

    pub async fn match_pending(&self) -> Result<MatchReport> {
        match_pending(self.storage.as_ref(), self.settings.match_window_days).await
    }

    pub async fn propagate_tags(&self) -> Result<TagReport> {
        propagate_tags(self.storage.as_ref(), &self.settings.investment_tag).await
    }

    pub async fn rebuild_taxonomy(&self) -> Result<Taxonomy> {
        rebuild_taxonomy(self.storage.as_ref()).await
    }

    pub async fn backfill(&self) -> Result<BackfillReport> {
        backfill_time_series(self.storage.as_ref(), self.settings.backfill_step_days).await
    }

    pub async fn update_performance(&self) -> Result<PerformanceReport> {
        update_performance(self.storage.as_ref(), self.clock.today_timestamp()).await
    }

    /// Run every stage in dependency order. Performance reads the history
    /// backfill writes, so it runs last.
    pub async fn run(&self) -> Result<EngineReport> {
        let resync = self.resync_marooned().await.context("Marooned resync failed")?;
        let matching = self.match_pending().await.context("Pending matching failed")?;
        let tags = self.propagate_tags().await.context("Tag propagation failed")?;
        let taxonomy = self
            .rebuild_taxonomy()
            .await
            .context("Taxonomy rebuild failed")?;
        let backfill = self.backfill().await.context("Backfill failed")?;
        let performance = self
            .update_performance()
            .await
            .context("Performance update failed")?;

        Ok(EngineReport {
            resync,
            matching,
            tags,
            taxonomy,
            backfill,
            performance,
        })
    }
}
