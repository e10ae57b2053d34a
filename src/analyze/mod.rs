// src/analyze/mod.rs
//! # Analysis pipeline
//! `StatisticsAggregator::run` selects the question set for a scope, short-circuits
//! when there is nothing to analyse, and otherwise runs the trend and content
//! stages and assembles an [`AnalysisResult`].
//!
//! State machine: `Pending -> {SkippedByScope, Running} -> Complete`. A skip is a
//! value ([`AnalysisOutcome::Skipped`]) with a reason, never an error, so callers
//! can tell "nothing to do" apart from a failed run.

pub mod content;
pub mod keywords;
pub mod stats;
pub mod temporal;
pub mod text;
pub mod trends;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::authors::AuthorRegistry;
use crate::config::EngineConfig;
use crate::error::{EngineError, PersistenceError};
use crate::ingest::{CommittedSet, SnapshotGate};
use crate::model::{AnalysisScope, Author, Question};
use crate::store::{Collection, QuestionFilter};

pub use content::{ContentAnalyzer, ContentQuality, ContentReport, SentimentSummary, TextView};
pub use keywords::{KeywordExtractor, KeywordScore};
pub use stats::{AuthorAnalysis, DateRange, GeneralStats};
pub use temporal::TemporalPatterns;
pub use trends::{GrowthRate, TagTrend, TagTrends, TrendAnalyzer, TrendReport};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("analysis_runs_total", "Completed analysis runs.");
        describe_counter!(
            "analysis_skipped_total",
            "Analysis runs skipped before any work (label: reason)."
        );
        describe_histogram!("analysis_ms", "Analysis duration in milliseconds.");
    });
}

/// Tag and temporal trends over a question set.
pub trait TrendStage: Send + Sync {
    fn compute(&self, questions: &[Question]) -> TrendReport;
}

impl TrendStage for TrendAnalyzer {
    fn compute(&self, questions: &[Question]) -> TrendReport {
        TrendAnalyzer::compute(self, questions)
    }
}

/// Keywords, sentiment and quality over a question set.
pub trait ContentStage: Send + Sync {
    fn analyze(&self, questions: &[Question]) -> ContentReport;
}

impl ContentStage for ContentAnalyzer {
    fn analyze(&self, questions: &[Question]) -> ContentReport {
        ContentAnalyzer::analyze(self, questions)
    }
}

/// Source of the questions an analysis runs over.
#[async_trait]
pub trait QuestionProvider: Send + Sync {
    async fn questions(&self) -> Result<Vec<Question>, PersistenceError>;
}

/// Every persisted question.
pub struct StoredQuestions {
    questions: Arc<dyn Collection<Question>>,
}

impl StoredQuestions {
    pub fn new(questions: Arc<dyn Collection<Question>>) -> Self {
        Self { questions }
    }
}

#[async_trait]
impl QuestionProvider for StoredQuestions {
    async fn questions(&self) -> Result<Vec<Question>, PersistenceError> {
        self.questions.find(&QuestionFilter::All).await
    }
}

/// Exactly the questions committed by one ingest call.
#[async_trait]
impl QuestionProvider for CommittedSet {
    async fn questions(&self) -> Result<Vec<Question>, PersistenceError> {
        Ok(self.questions().to_vec())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisState {
    Pending,
    SkippedByScope,
    Running,
    Complete,
}

impl fmt::Display for AnalysisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AnalysisState::Pending => "PENDING",
            AnalysisState::SkippedByScope => "SKIPPED_BY_SCOPE",
            AnalysisState::Running => "RUNNING",
            AnalysisState::Complete => "COMPLETE",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// `new-only` scope and the last ingest committed nothing.
    NoNewData,
    /// The selected set is empty (nothing stored yet).
    EmptyCorpus,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoNewData => "no_new_data",
            SkipReason::EmptyCorpus => "empty_corpus",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Complete(Box<AnalysisResult>),
    Skipped { reason: SkipReason },
}

impl AnalysisOutcome {
    pub fn state(&self) -> AnalysisState {
        match self {
            AnalysisOutcome::Complete(_) => AnalysisState::Complete,
            AnalysisOutcome::Skipped { .. } => AnalysisState::SkippedByScope,
        }
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            AnalysisOutcome::Complete(r) => Some(r.as_ref()),
            AnalysisOutcome::Skipped { .. } => None,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            AnalysisOutcome::Skipped { reason } => Some(*reason),
            AnalysisOutcome::Complete(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub scope: AnalysisScope,
    pub question_count_analyzed: usize,
    pub date_range: Option<DateRange>,
    pub tag_trends: TagTrends,
    pub temporal_patterns: TemporalPatterns,
    pub content_analysis: ContentReport,
    pub author_analysis: AuthorAnalysis,
    pub general_stats: GeneralStats,
    pub computed_at: DateTime<Utc>,
}

pub struct StatisticsAggregator {
    trends: Arc<dyn TrendStage>,
    content: Arc<dyn ContentStage>,
    registry: AuthorRegistry,
    gate: Option<SnapshotGate>,
    top_tags: usize,
    top_authors: usize,
}

impl StatisticsAggregator {
    pub fn new(
        trends: Arc<dyn TrendStage>,
        content: Arc<dyn ContentStage>,
        authors: Arc<dyn Collection<Author>>,
    ) -> Self {
        Self {
            trends,
            content,
            registry: AuthorRegistry::new(authors),
            gate: None,
            top_tags: 20,
            top_authors: 10,
        }
    }

    pub fn from_config(cfg: &EngineConfig, authors: Arc<dyn Collection<Author>>) -> Self {
        let a = &cfg.analysis;
        let mut agg = Self::new(
            Arc::new(TrendAnalyzer::new(a.trending_threshold, a.top_tags)),
            Arc::new(ContentAnalyzer::new(a, &cfg.quality)),
            authors,
        );
        agg.top_tags = a.top_tags;
        agg.top_authors = a.top_authors;
        agg
    }

    /// Read under `gate` so a run never sees a half-written batch.
    pub fn with_gate(mut self, gate: SnapshotGate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub async fn run(
        &self,
        scope: AnalysisScope,
        all_questions: &dyn QuestionProvider,
        new_questions: &dyn QuestionProvider,
    ) -> Result<AnalysisOutcome, EngineError> {
        ensure_metrics_described();
        let started = Instant::now();
        debug!(target: "analysis", scope = %scope, state = %AnalysisState::Pending, "analysis requested");

        let (questions, authors) = {
            let _snapshot = match &self.gate {
                Some(g) => Some(g.read().await),
                None => None,
            };
            let questions = match scope {
                AnalysisScope::NewOnly => new_questions.questions().await?,
                AnalysisScope::All => all_questions.questions().await?,
            };
            if questions.is_empty() {
                let reason = match scope {
                    AnalysisScope::NewOnly => SkipReason::NoNewData,
                    AnalysisScope::All => SkipReason::EmptyCorpus,
                };
                counter!("analysis_skipped_total", "reason" => reason.as_str()).increment(1);
                info!(
                    target: "analysis",
                    scope = %scope,
                    state = %AnalysisState::SkippedByScope,
                    reason = reason.as_str(),
                    "analysis skipped"
                );
                return Ok(AnalysisOutcome::Skipped { reason });
            }
            let names: BTreeSet<String> = questions
                .iter()
                .filter(|q| q.has_known_author())
                .map(|q| q.author_name.clone())
                .collect();
            let authors = self.registry.find(&names).await?;
            (questions, authors)
        };

        info!(
            target: "analysis",
            scope = %scope,
            state = %AnalysisState::Running,
            questions = questions.len(),
            "analysis running"
        );

        let trends = self.trends.compute(&questions);
        let content = self.content.analyze(&questions);
        let general = stats::general_stats(&questions, self.top_tags);
        let author_analysis = stats::author_analysis(&questions, &authors, self.top_authors);

        let result = AnalysisResult {
            scope,
            question_count_analyzed: questions.len(),
            date_range: general.date_range,
            tag_trends: trends.tag_trends,
            temporal_patterns: trends.temporal_patterns,
            content_analysis: content,
            author_analysis,
            general_stats: general,
            computed_at: Utc::now(),
        };

        let ms = started.elapsed().as_secs_f64() * 1_000.0;
        counter!("analysis_runs_total").increment(1);
        histogram!("analysis_ms").record(ms);
        info!(
            target: "analysis",
            scope = %scope,
            state = %AnalysisState::Complete,
            questions = result.question_count_analyzed,
            unique_tags = result.tag_trends.unique_tags,
            elapsed_ms = ms,
            "analysis complete"
        );
        Ok(AnalysisOutcome::Complete(Box::new(result)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCollection;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingStages {
        trend_calls: AtomicUsize,
        content_calls: AtomicUsize,
    }

    impl TrendStage for CountingStages {
        fn compute(&self, questions: &[Question]) -> TrendReport {
            self.trend_calls.fetch_add(1, Ordering::SeqCst);
            TrendAnalyzer::new(20.0, 10).compute(questions)
        }
    }

    impl ContentStage for CountingStages {
        fn analyze(&self, questions: &[Question]) -> ContentReport {
            self.content_calls.fetch_add(1, Ordering::SeqCst);
            ContentAnalyzer::new(&Default::default(), &Default::default()).analyze(questions)
        }
    }

    #[tokio::test]
    async fn empty_store_skips_all_scope() {
        let stages = Arc::new(CountingStages::default());
        let authors: Arc<MemoryCollection<Author>> = Arc::new(MemoryCollection::new());
        let questions: Arc<MemoryCollection<Question>> = Arc::new(MemoryCollection::new());
        let agg = StatisticsAggregator::new(stages.clone(), stages.clone(), authors);

        let out = agg
            .run(AnalysisScope::All, &StoredQuestions::new(questions), &CommittedSet::default())
            .await
            .unwrap();
        assert_eq!(out.skip_reason(), Some(SkipReason::EmptyCorpus));
        assert_eq!(out.state(), AnalysisState::SkippedByScope);
        assert_eq!(stages.trend_calls.load(Ordering::SeqCst), 0);
        assert_eq!(stages.content_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn skipped_outcome_serializes_with_reason() {
        let out = AnalysisOutcome::Skipped {
            reason: SkipReason::NoNewData,
        };
        let v = serde_json::to_value(&out).unwrap();
        assert_eq!(v["status"], "skipped");
        assert_eq!(v["reason"], "no_new_data");
    }
}
