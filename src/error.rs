// src/error.rs
//! Error kinds of the engine.
//!
//! - `ValidationError`: one malformed record; recovered locally, the batch continues.
//! - `PersistenceError`: the document store is unreachable or rejected a call;
//!   fatal for the current ingest and always propagated.
//! - `EngineError`: what `ingest` and analysis runs return to their caller.
//!
//! An empty or scope-inconsistent analysis set is *not* an error: it surfaces as
//! `analyze::AnalysisOutcome::Skipped` with a reason.

use std::io;

use thiserror::Error;

/// A single record failed validation/coercion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid field `{field}`: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Failure reported by (or on the way to) the document store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("document store '{collection}' is unavailable: {reason}")]
    Unavailable {
        collection: &'static str,
        reason: String,
    },
    #[error("document store '{collection}' rejected write for key '{key}': {reason}")]
    Rejected {
        collection: &'static str,
        key: String,
        reason: String,
    },
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Error returned by the engine entry points.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("persistence failure: {0}")]
    Persistence(#[from] PersistenceError),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
