// src/store/mod.rs
//! Persistence collaborator seam.
//!
//! The engine never owns a database. It talks to one through four primitives per
//! collection (`upsert`, batched `exists_any`, `find`, `get`), each assumed atomic
//! per call. [`memory`] provides the reference implementation used by the binary
//! and the tests.

pub mod memory;

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyze::AnalysisResult;
use crate::error::PersistenceError;
use crate::model::{Author, Question};

pub use memory::{MemoryCollection, MemoryStore};

/// A document kind stored in its own collection.
pub trait Document: Clone + Debug + Send + Sync + 'static {
    type Key: Ord + Clone + Debug + Send + Sync + 'static;
    type Filter: Debug + Send + Sync;

    /// Collection name, used in errors and logs.
    const COLLECTION: &'static str;

    fn key(&self) -> Self::Key;

    /// In-process evaluation of a filter (used by [`MemoryCollection`]).
    fn matches(&self, filter: &Self::Filter) -> bool;

    /// Ordering applied to `find` results.
    fn sort(docs: &mut [Self]);
}

/// The four primitives consumed from the document store.
#[async_trait]
pub trait Collection<D: Document>: Send + Sync {
    async fn upsert(&self, key: D::Key, doc: D) -> Result<(), PersistenceError>;

    /// Subset of `keys` already present, in one round trip.
    async fn exists_any(&self, keys: &BTreeSet<D::Key>) -> Result<BTreeSet<D::Key>, PersistenceError>;

    async fn find(&self, filter: &D::Filter) -> Result<Vec<D>, PersistenceError>;

    async fn get(&self, key: &D::Key) -> Result<Option<D>, PersistenceError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuestionFilter {
    All,
    Ids(BTreeSet<u64>),
    /// Inclusive on both ends.
    PublishedBetween(DateTime<Utc>, DateTime<Utc>),
    /// Any of the given tags, case-insensitive.
    AnyTag(Vec<String>),
}

impl Document for Question {
    type Key = u64;
    type Filter = QuestionFilter;
    const COLLECTION: &'static str = "questions";

    fn key(&self) -> u64 {
        self.question_id
    }

    fn matches(&self, filter: &QuestionFilter) -> bool {
        match filter {
            QuestionFilter::All => true,
            QuestionFilter::Ids(ids) => ids.contains(&self.question_id),
            QuestionFilter::PublishedBetween(from, to) => {
                self.publication_date >= *from && self.publication_date <= *to
            }
            QuestionFilter::AnyTag(tags) => self
                .tags
                .iter()
                .any(|t| tags.iter().any(|w| w.eq_ignore_ascii_case(t))),
        }
    }

    /// Newest first; id breaks ties so results are deterministic.
    fn sort(docs: &mut [Self]) {
        docs.sort_by(|a, b| {
            b.publication_date
                .cmp(&a.publication_date)
                .then(a.question_id.cmp(&b.question_id))
        });
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthorFilter {
    All,
    Names(BTreeSet<String>),
}

impl Document for Author {
    type Key = String;
    type Filter = AuthorFilter;
    const COLLECTION: &'static str = "authors";

    fn key(&self) -> String {
        self.author_name.clone()
    }

    fn matches(&self, filter: &AuthorFilter) -> bool {
        match filter {
            AuthorFilter::All => true,
            AuthorFilter::Names(names) => names.contains(&self.author_name),
        }
    }

    /// Most questions first, then name.
    fn sort(docs: &mut [Self]) {
        docs.sort_by(|a, b| {
            b.question_count
                .cmp(&a.question_count)
                .then_with(|| a.author_name.cmp(&b.author_name))
        });
    }
}

/// Audit copy of a completed analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub analysis_id: String,
    pub analysis_date: DateTime<Utc>,
    pub result: AnalysisResult,
}

impl AnalysisRecord {
    pub fn new(result: AnalysisResult) -> Self {
        Self {
            analysis_id: format!("{}:{}", result.computed_at.to_rfc3339(), result.scope),
            analysis_date: result.computed_at,
            result,
        }
    }
}

impl Document for AnalysisRecord {
    type Key = String;
    type Filter = ();
    const COLLECTION: &'static str = "analysis";

    fn key(&self) -> String {
        self.analysis_id.clone()
    }

    fn matches(&self, _filter: &()) -> bool {
        true
    }

    fn sort(docs: &mut [Self]) {
        docs.sort_by(|a, b| b.analysis_date.cmp(&a.analysis_date));
    }
}

/// Handles to the three collections the engine uses.
#[derive(Clone)]
pub struct Store {
    pub questions: Arc<dyn Collection<Question>>,
    pub authors: Arc<dyn Collection<Author>>,
    pub analyses: Arc<dyn Collection<AnalysisRecord>>,
}

impl Store {
    pub fn new(
        questions: Arc<dyn Collection<Question>>,
        authors: Arc<dyn Collection<Author>>,
        analyses: Arc<dyn Collection<AnalysisRecord>>,
    ) -> Self {
        Self {
            questions,
            authors,
            analyses,
        }
    }

    /// Persist an analysis result as an audit record.
    pub async fn record_analysis(&self, result: &AnalysisResult) -> Result<(), PersistenceError> {
        let rec = AnalysisRecord::new(result.clone());
        self.analyses.upsert(rec.key(), rec).await
    }

    /// Collection sizes and the publication-date span of stored questions.
    pub async fn database_stats(&self) -> Result<DatabaseStats, PersistenceError> {
        let questions = self.questions.find(&QuestionFilter::All).await?;
        let authors = self.authors.find(&AuthorFilter::All).await?;
        let analyses = self.analyses.find(&()).await?;
        Ok(DatabaseStats {
            questions_count: questions.len(),
            authors_count: authors.len(),
            analysis_count: analyses.len(),
            first_question_date: questions.iter().map(|q| q.publication_date).min(),
            last_question_date: questions.iter().map(|q| q.publication_date).max(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseStats {
    pub questions_count: usize,
    pub authors_count: usize,
    pub analysis_count: usize,
    pub first_question_date: Option<DateTime<Utc>>,
    pub last_question_date: Option<DateTime<Utc>>,
}
