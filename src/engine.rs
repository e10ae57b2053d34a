//! # Trend Engine
//! Wires the pieces together the way one collection run uses them:
//! raw records -> [`RecordNormalizer`] -> [`DedupStore`] -> [`StatisticsAggregator`].
//!
//! The committed set of the ingest is handed to the aggregator explicitly; nothing
//! remembers "the current run" behind the caller's back.

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::analyze::{AnalysisOutcome, StatisticsAggregator, StoredQuestions};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::ingest::{CommittedSet, DedupStore, IngestReport};
use crate::model::{Question, StorageOutcome};
use crate::normalize::RecordNormalizer;
use crate::store::Store;

/// What one `run_batch` produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub storage: StorageOutcome,
    /// `None` when analysis is disabled in the config.
    pub analysis: Option<AnalysisOutcome>,
}

pub struct TrendEngine {
    config: EngineConfig,
    store: Store,
    normalizer: RecordNormalizer,
    dedup: DedupStore,
    aggregator: StatisticsAggregator,
}

impl TrendEngine {
    pub fn new(config: EngineConfig, store: Store) -> Self {
        let dedup = DedupStore::new(store.clone());
        let aggregator =
            StatisticsAggregator::from_config(&config, store.authors.clone()).with_gate(dedup.gate());
        Self {
            normalizer: RecordNormalizer::new(config.normalize.clock_skew_secs),
            config,
            store,
            dedup,
            aggregator,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn dedup(&self) -> &DedupStore {
        &self.dedup
    }

    /// Ingest already-normalized questions with the configured storage mode.
    pub async fn ingest(&self, questions: Vec<Question>) -> Result<IngestReport, EngineError> {
        self.dedup.ingest(questions, self.config.storage.mode).await
    }

    pub async fn ingest_raw(&self, raws: &[Value]) -> Result<IngestReport, EngineError> {
        self.dedup
            .ingest_raw(&self.normalizer, raws, self.config.storage.mode)
            .await
    }

    /// Analyse with the configured scope; `committed` is the new-only set.
    pub async fn analyze(&self, committed: &CommittedSet) -> Result<AnalysisOutcome, EngineError> {
        let all = StoredQuestions::new(self.store.questions.clone());
        let outcome = self
            .aggregator
            .run(self.config.analysis.scope, &all, committed)
            .await?;

        if let (true, Some(result)) = (self.config.storage.persist_analysis, outcome.result()) {
            // The audit copy is best effort; the computed result is still returned.
            if let Err(e) = self.store.record_analysis(result).await {
                warn!(target: "analysis", error = %e, "failed to persist analysis record");
            }
        }
        Ok(outcome)
    }

    /// Normalize, ingest and (when enabled) analyse one batch of raw records.
    pub async fn run_batch(&self, raws: &[Value]) -> Result<RunReport, EngineError> {
        let report = self.ingest_raw(raws).await?;
        let analysis = if self.config.analysis.enabled {
            Some(self.analyze(&report.committed).await?)
        } else {
            info!(target: "analysis", "analysis disabled");
            None
        };
        Ok(RunReport {
            storage: report.outcome,
            analysis,
        })
    }
}
