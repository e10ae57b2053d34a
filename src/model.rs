// src/model.rs
//! Canonical entities and value types shared by ingestion and analysis.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Author name used when the source did not expose one.
/// Such questions are stored, but never reconciled into the author registry.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// A forum question, keyed by `question_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub question_id: u64,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub summary: String,
    pub tags: Vec<String>,
    pub author_name: String,
    #[serde(default)]
    pub author_profile_url: String,
    #[serde(default)]
    pub author_reputation: u64,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub vote_count: u64,
    #[serde(default)]
    pub answer_count: u64,
    pub publication_date: DateTime<Utc>,
    /// Set by the store on first write; `None` until then.
    #[serde(default)]
    pub stored_at: Option<DateTime<Utc>>,
    /// Set by the store on every write; `None` until then.
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Question {
    /// Re-check the invariants the normalizer establishes.
    ///
    /// Questions built by hand (tests, other collaborators) can bypass the
    /// normalizer, so the store calls this before every write.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.question_id == 0 {
            return Err(ValidationError::new(
                "question_id",
                "must be a positive integer",
            ));
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::new("title", "must not be empty"));
        }
        if self.tags.is_empty() {
            return Err(ValidationError::new("tags", "must contain at least one tag"));
        }
        let mut seen = HashSet::with_capacity(self.tags.len());
        for t in &self.tags {
            if t.trim().is_empty() || t.trim() != t {
                return Err(ValidationError::new("tags", format!("`{t}` is blank or padded")));
            }
            if !seen.insert(t.to_lowercase()) {
                return Err(ValidationError::new("tags", format!("`{t}` repeats another tag")));
            }
        }
        if self.author_name.trim().is_empty() {
            return Err(ValidationError::new("author_name", "must not be empty"));
        }
        Ok(())
    }

    pub fn has_known_author(&self) -> bool {
        self.author_name != UNKNOWN_AUTHOR
    }

    /// Title and summary joined by a space, trimmed.
    pub fn combined_text(&self) -> String {
        format!("{} {}", self.title, self.summary).trim().to_string()
    }
}

/// Author record, keyed by display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub author_name: String,
    #[serde(default)]
    pub profile_url: String,
    #[serde(default)]
    pub reputation: u64,
    pub question_count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Storage policy for an ingest call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageMode {
    /// Upsert every incoming question.
    #[default]
    Update,
    /// Write only questions whose id is not stored yet.
    AppendOnly,
}

impl StorageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageMode::Update => "update",
            StorageMode::AppendOnly => "append-only",
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "update" => Ok(StorageMode::Update),
            "append-only" | "append" => Ok(StorageMode::AppendOnly),
            other => Err(format!("unknown storage mode `{other}`")),
        }
    }
}

/// Which stored questions an analysis run considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisScope {
    #[default]
    All,
    NewOnly,
}

impl AnalysisScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisScope::All => "all",
            AnalysisScope::NewOnly => "new-only",
        }
    }
}

impl fmt::Display for AnalysisScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "all" => Ok(AnalysisScope::All),
            "new-only" | "new" => Ok(AnalysisScope::NewOnly),
            other => Err(format!("unknown analysis scope `{other}`")),
        }
    }
}

/// Result of reconciling one author sighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthorOutcome {
    New,
    Updated,
    Unchanged,
    /// Anonymous author; the registry was not touched.
    Skipped,
}

/// Per-ingest storage metrics, consumed by the report generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageOutcome {
    pub mode: StorageMode,
    pub questions_received: usize,
    /// UPDATE: every applied write. APPEND_ONLY: new rows only.
    pub questions_written: usize,
    pub duplicates_skipped: usize,
    pub rejected: usize,
    pub authors_new: usize,
    pub authors_updated: usize,
    pub authors_unchanged: usize,
    pub authors_skipped: usize,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
}

impl StorageOutcome {
    pub fn empty(mode: StorageMode) -> Self {
        Self {
            mode,
            questions_received: 0,
            questions_written: 0,
            duplicates_skipped: 0,
            rejected: 0,
            authors_new: 0,
            authors_updated: 0,
            authors_unchanged: 0,
            authors_skipped: 0,
            duration: Duration::ZERO,
        }
    }

    pub(crate) fn count_author(&mut self, outcome: AuthorOutcome) {
        match outcome {
            AuthorOutcome::New => self.authors_new += 1,
            AuthorOutcome::Updated => self.authors_updated += 1,
            AuthorOutcome::Unchanged => self.authors_unchanged += 1,
            AuthorOutcome::Skipped => self.authors_skipped += 1,
        }
    }
}

/// `Duration` as fractional seconds, so reports get a plain number.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(if secs.is_finite() { Duration::from_secs_f64(secs.max(0.0)) } else { Duration::ZERO })
    }
}
