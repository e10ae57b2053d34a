// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod authors;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod normalize;
pub mod sentiment;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::analyze::{AnalysisOutcome, AnalysisResult, AnalysisState, SkipReason, StatisticsAggregator};
pub use crate::authors::AuthorRegistry;
pub use crate::config::EngineConfig;
pub use crate::engine::TrendEngine;
pub use crate::error::{EngineError, PersistenceError, ValidationError};
pub use crate::ingest::{CommittedSet, DedupStore, IngestReport};
pub use crate::model::{AnalysisScope, Author, AuthorOutcome, Question, StorageMode, StorageOutcome};
pub use crate::normalize::RecordNormalizer;
pub use crate::store::{MemoryStore, Store};
