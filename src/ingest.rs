// src/ingest.rs
//! # Dedup Store
//! Decides, per storage mode, which questions are written and how, and keeps the
//! author registry in step with what was actually committed.
//!
//! - `Update`: every question is upserted by `question_id`. The original
//!   `stored_at` and `publication_date` survive, `last_updated` always advances.
//!   Every write counts toward `questions_written`.
//! - `AppendOnly`: one batched existence check up front; ids already stored (or
//!   repeated within the batch) are dropped before any write. Only inserts count.
//!
//! A batch is one logical unit: it holds the write side of the [`SnapshotGate`]
//! from the first read to the last write, so analysis never sees half a batch and
//! two ingests never interleave.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::authors::{Attribution, AuthorRegistry, AuthorSighting};
use crate::error::{EngineError, PersistenceError};
use crate::model::{AuthorOutcome, Question, StorageMode, StorageOutcome};
use crate::normalize::RecordNormalizer;
use crate::store::{QuestionFilter, Store};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "ingest_questions_written_total",
            "Questions written (inserts, plus replacements in update mode)."
        );
        describe_counter!(
            "ingest_duplicates_skipped_total",
            "Questions dropped because their id was already stored."
        );
        describe_counter!(
            "ingest_rejected_total",
            "Records rejected by validation."
        );
        describe_counter!("ingest_authors_new_total", "Authors seen for the first time.");
        describe_counter!(
            "ingest_authors_updated_total",
            "Authors whose reputation changed."
        );
        describe_histogram!("ingest_batch_ms", "Ingest batch duration in milliseconds.");
        describe_gauge!("ingest_last_run_ts", "Unix ts when an ingest batch last finished.");
    });
}

/// Consistency gate between ingestion (writer) and analysis (readers).
#[derive(Debug, Clone, Default)]
pub struct SnapshotGate(Arc<RwLock<()>>);

impl SnapshotGate {
    /// Held by analysis while it reads; waits for any in-flight batch.
    pub async fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.0.read().await
    }

    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.0.write().await
    }
}

/// Questions committed by one ingest call, as written (first-seen order, one entry per id).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommittedSet {
    questions: Vec<Question>,
}

impl CommittedSet {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn ids(&self) -> BTreeSet<u64> {
        self.questions.iter().map(|q| q.question_id).collect()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// What `ingest` hands back: metrics for the report plus the committed records,
/// which become the `new-only` analysis scope.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub outcome: StorageOutcome,
    pub committed: CommittedSet,
}

pub struct DedupStore {
    store: Store,
    registry: AuthorRegistry,
    gate: SnapshotGate,
}

impl DedupStore {
    pub fn new(store: Store) -> Self {
        Self::with_gate(store, SnapshotGate::default())
    }

    pub fn with_gate(store: Store, gate: SnapshotGate) -> Self {
        let registry = AuthorRegistry::new(store.authors.clone());
        Self {
            store,
            registry,
            gate,
        }
    }

    pub fn gate(&self) -> SnapshotGate {
        self.gate.clone()
    }

    pub fn registry(&self) -> &AuthorRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Normalize raw records, then ingest the valid ones. Normalization failures
    /// are counted in `rejected` and never abort the batch.
    pub async fn ingest_raw(
        &self,
        normalizer: &RecordNormalizer,
        raws: &[Value],
        mode: StorageMode,
    ) -> Result<IngestReport, EngineError> {
        let batch = normalizer.normalize_batch(raws);
        let mut report = self.ingest(batch.questions, mode).await?;
        report.outcome.questions_received += batch.rejected.len();
        report.outcome.rejected += batch.rejected.len();
        if !batch.rejected.is_empty() {
            counter!("ingest_rejected_total").increment(batch.rejected.len() as u64);
        }
        Ok(report)
    }

    /// Store a batch of normalized questions according to `mode`.
    pub async fn ingest(&self, questions: Vec<Question>, mode: StorageMode) -> Result<IngestReport, EngineError> {
        ensure_metrics_described();
        let started = Instant::now();
        let _batch = self.gate.write().await;

        let mut outcome = StorageOutcome::empty(mode);
        outcome.questions_received = questions.len();

        let mut valid = Vec::with_capacity(questions.len());
        for q in questions {
            match q.validate() {
                Ok(()) => valid.push(q),
                Err(e) => {
                    warn!(
                        target: "ingest",
                        question_id = q.question_id,
                        field = e.field,
                        reason = %e.reason,
                        "skipping invalid question"
                    );
                    outcome.rejected += 1;
                }
            }
        }
        let ids: BTreeSet<u64> = valid.iter().map(|q| q.question_id).collect();

        let committed = match mode {
            StorageMode::AppendOnly => self.append_only(valid, &ids, &mut outcome).await,
            StorageMode::Update => self.update(valid, &ids, &mut outcome).await,
        }
        .map_err(|e| {
            warn!(target: "ingest", error = %e, mode = %mode, "ingest aborted");
            EngineError::from(e)
        })?;

        outcome.duration = started.elapsed();

        // Telemetry
        counter!("ingest_questions_written_total").increment(outcome.questions_written as u64);
        counter!("ingest_duplicates_skipped_total").increment(outcome.duplicates_skipped as u64);
        counter!("ingest_rejected_total").increment(outcome.rejected as u64);
        counter!("ingest_authors_new_total").increment(outcome.authors_new as u64);
        counter!("ingest_authors_updated_total").increment(outcome.authors_updated as u64);
        histogram!("ingest_batch_ms").record(outcome.duration.as_secs_f64() * 1_000.0);
        gauge!("ingest_last_run_ts").set(Utc::now().timestamp() as f64);

        info!(
            target: "ingest",
            mode = %mode,
            received = outcome.questions_received,
            written = outcome.questions_written,
            duplicates = outcome.duplicates_skipped,
            rejected = outcome.rejected,
            authors_new = outcome.authors_new,
            authors_updated = outcome.authors_updated,
            "batch stored"
        );

        Ok(IngestReport {
            outcome,
            committed: CommittedSet::new(committed),
        })
    }

    /// Write one question together with its author bookkeeping.
    ///
    /// The author side goes first and is rolled back when the question write fails,
    /// so an aborted batch leaves every author counting exactly its stored
    /// questions and a retry of the same batch counts each question once.
    async fn commit(
        &self,
        q: &Question,
        attribution: Attribution,
        released: Option<&str>,
    ) -> Result<AuthorOutcome, PersistenceError> {
        if let Some(prev) = released {
            self.registry.release(prev).await?;
        }
        let author = match self
            .registry
            .reconcile_with(&AuthorSighting::from_question(q), attribution)
            .await
        {
            Ok(a) => a,
            Err(e) => {
                if let Some(prev) = released {
                    rollback_failed(self.registry.restore(prev).await, prev, q.question_id);
                }
                return Err(e);
            }
        };

        if let Err(e) = self.store.questions.upsert(q.question_id, q.clone()).await {
            if attribution == Attribution::NewQuestion && author != AuthorOutcome::Skipped {
                rollback_failed(self.registry.release(&q.author_name).await, &q.author_name, q.question_id);
            }
            if let Some(prev) = released {
                rollback_failed(self.registry.restore(prev).await, prev, q.question_id);
            }
            return Err(e);
        }
        Ok(author)
    }

    async fn append_only(
        &self,
        valid: Vec<Question>,
        ids: &BTreeSet<u64>,
        outcome: &mut StorageOutcome,
    ) -> Result<Vec<Question>, PersistenceError> {
        let existing = if ids.is_empty() {
            BTreeSet::new()
        } else {
            self.store.questions.exists_any(ids).await?
        };

        let now = Utc::now();
        let mut seen = HashSet::with_capacity(valid.len());
        let mut committed = Vec::with_capacity(valid.len());

        for mut q in valid {
            if existing.contains(&q.question_id) || !seen.insert(q.question_id) {
                debug!(target: "ingest", question_id = q.question_id, "already stored; skipped");
                outcome.duplicates_skipped += 1;
                continue;
            }
            q.stored_at = Some(now);
            q.last_updated = Some(now);

            let author = self.commit(&q, Attribution::NewQuestion, None).await?;
            outcome.count_author(author);
            outcome.questions_written += 1;
            committed.push(q);
        }
        Ok(committed)
    }

    async fn update(
        &self,
        valid: Vec<Question>,
        ids: &BTreeSet<u64>,
        outcome: &mut StorageOutcome,
    ) -> Result<Vec<Question>, PersistenceError> {
        // Latest stored version per id; in-batch writes are folded in as we go.
        let mut current: HashMap<u64, Question> = if ids.is_empty() {
            HashMap::new()
        } else {
            self.store
                .questions
                .find(&QuestionFilter::Ids(ids.clone()))
                .await?
                .into_iter()
                .map(|q| (q.question_id, q))
                .collect()
        };

        let mut committed: Vec<Question> = Vec::with_capacity(valid.len());
        let mut slot: HashMap<u64, usize> = HashMap::with_capacity(valid.len());

        for mut q in valid {
            let now = Utc::now();
            let mut released: Option<String> = None;
            let attribution = match current.get(&q.question_id) {
                Some(prior) => {
                    q.stored_at = prior.stored_at.or(Some(now));
                    q.publication_date = prior.publication_date;
                    q.last_updated = Some(advance(now, prior.last_updated));
                    if prior.author_name != q.author_name {
                        released = Some(prior.author_name.clone());
                        Attribution::NewQuestion
                    } else {
                        Attribution::Existing
                    }
                }
                None => {
                    q.stored_at = Some(now);
                    q.last_updated = Some(now);
                    Attribution::NewQuestion
                }
            };

            if let Some(prev_author) = &released {
                debug!(
                    target: "ingest",
                    question_id = q.question_id,
                    from = %prev_author,
                    to = %q.author_name,
                    "question reattributed"
                );
            }
            let author = self.commit(&q, attribution, released.as_deref()).await?;
            outcome.count_author(author);
            outcome.questions_written += 1;

            match slot.get(&q.question_id) {
                Some(&i) => committed[i] = q.clone(),
                None => {
                    slot.insert(q.question_id, committed.len());
                    committed.push(q.clone());
                }
            }
            current.insert(q.question_id, q);
        }
        Ok(committed)
    }
}

/// Log a rollback step that could not be applied; the batch error still propagates.
fn rollback_failed(res: Result<(), PersistenceError>, author: &str, question_id: u64) {
    if let Err(e) = res {
        warn!(
            target: "ingest",
            question_id,
            author,
            error = %e,
            "author rollback failed; question_count may drift"
        );
    }
}

/// `now`, or just past `prev` when the clock has not moved beyond it.
fn advance(now: DateTime<Utc>, prev: Option<DateTime<Utc>>) -> DateTime<Utc> {
    match prev {
        Some(p) if now <= p => p + Duration::microseconds(1),
        _ => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn advance_is_strictly_monotonic() {
        let t = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(advance(t, None), t);
        assert!(advance(t, Some(t)) > t);
        let later = t + Duration::seconds(5);
        assert_eq!(advance(later, Some(t)), later);
    }

    #[test]
    fn committed_set_exposes_ids() {
        let set = CommittedSet::default();
        assert!(set.is_empty());
        assert!(set.ids().is_empty());
    }
}
