// src/config.rs
//! # Engine configuration
//! TOML or JSON, resolved in this order:
//! 1) `$TREND_CONFIG_PATH` (must exist)
//! 2) `config/engine.toml`
//! 3) `config/engine.json`
//! 4) built-in defaults
//!
//! Every section and field is optional. A few knobs can be overridden from the
//! environment (`TREND_STORAGE_MODE`, `TREND_ANALYSIS_SCOPE`,
//! `TREND_TRENDING_THRESHOLD`); unparsable values are ignored with a warning.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::{AnalysisScope, StorageMode};
use crate::normalize::DEFAULT_CLOCK_SKEW_SECS;

pub const ENV_CONFIG_PATH: &str = "TREND_CONFIG_PATH";
pub const ENV_STORAGE_MODE: &str = "TREND_STORAGE_MODE";
pub const ENV_ANALYSIS_SCOPE: &str = "TREND_ANALYSIS_SCOPE";
pub const ENV_TRENDING_THRESHOLD: &str = "TREND_TRENDING_THRESHOLD";

const DEFAULT_TOML_PATH: &str = "config/engine.toml";
const DEFAULT_JSON_PATH: &str = "config/engine.json";

/// Trending thresholds outside this band are clamped (percent).
const TRENDING_THRESHOLD_RANGE: (f64, f64) = (-100.0, 10_000.0);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub storage: StorageConfig,
    pub normalize: NormalizeConfig,
    pub analysis: AnalysisConfig,
    pub quality: QualityConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub mode: StorageMode,
    /// JSON snapshot backing the in-memory store between runs.
    pub snapshot_path: Option<PathBuf>,
    /// Keep an audit copy of every completed analysis.
    pub persist_analysis: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub clock_skew_secs: i64,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            clock_skew_secs: DEFAULT_CLOCK_SKEW_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub enabled: bool,
    pub scope: AnalysisScope,
    /// Growth (percent) a tag must exceed to count as trending.
    pub trending_threshold: f64,
    /// Polarity beyond +/- this value is positive/negative.
    pub sentiment_threshold: f64,
    pub top_keywords: usize,
    pub top_combined_keywords: usize,
    /// 1 = unigrams, 2 = unigrams and bigrams.
    pub keyword_ngram_max: usize,
    pub top_tags: usize,
    pub top_authors: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scope: AnalysisScope::All,
            trending_threshold: 20.0,
            sentiment_threshold: 0.1,
            top_keywords: 20,
            top_combined_keywords: 30,
            keyword_ngram_max: 2,
            top_tags: 20,
            top_authors: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// A summary counts as complete when it has more words than this.
    pub summary_min_words: usize,
    /// Minimum summary words for a question to count as well-formed.
    pub clarity_min_summary_words: usize,
    pub technical_terms: Vec<String>,
    pub advanced_terms: Vec<String>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        let owned = |xs: &[&str]| -> Vec<String> { xs.iter().map(|s| s.to_string()).collect() };
        Self {
            summary_min_words: 20,
            clarity_min_summary_words: 10,
            technical_terms: owned(&[
                "function", "class", "method", "variable", "algorithm", "library", "framework",
                "api", "database", "server", "client", "code", "syntax", "error", "exception",
                "debug", "compile", "runtime", "async", "await",
            ]),
            advanced_terms: owned(&[
                "performance",
                "optimization",
                "architecture",
                "design pattern",
                "security",
                "scalability",
                "microservices",
                "deployment",
                "testing",
                "refactoring",
                "best practices",
                "clean code",
            ]),
        }
    }
}

impl EngineConfig {
    /// Resolve the config file (see module docs), then apply env overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = match resolve_path()? {
            Some(path) => {
                let cfg = Self::load_from(&path)?;
                info!(target: "config", path = %path.display(), "engine config loaded");
                cfg
            }
            None => {
                info!(target: "config", "no engine config file; using defaults");
                Self::default()
            }
        };
        cfg.apply_env_overrides();
        Ok(cfg.sanitized())
    }

    /// Load from an explicit path. TOML or JSON by extension, sniffing content otherwise.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading engine config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        Self::parse(&content, &ext)
            .with_context(|| format!("parsing engine config {}", path.display()))
            .map(Self::sanitized)
    }

    pub fn parse(s: &str, hint_ext: &str) -> Result<Self> {
        match hint_ext {
            "toml" => return Ok(toml::from_str(s)?),
            "json" => return Ok(serde_json::from_str(s)?),
            _ => {}
        }
        if s.trim_start().starts_with('{') {
            if let Ok(v) = serde_json::from_str(s) {
                return Ok(v);
            }
        }
        toml::from_str(s).map_err(|e| anyhow!("unsupported engine config format: {e}"))
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(mode) = parse_env::<StorageMode>(ENV_STORAGE_MODE) {
            self.storage.mode = mode;
        }
        if let Some(scope) = parse_env::<AnalysisScope>(ENV_ANALYSIS_SCOPE) {
            self.analysis.scope = scope;
        }
        if let Some(t) = parse_threshold_env(std::env::var(ENV_TRENDING_THRESHOLD).ok()) {
            self.analysis.trending_threshold = t;
        }
    }

    /// Clamp values that would make analysis meaningless.
    fn sanitized(mut self) -> Self {
        let a = &mut self.analysis;
        if !a.trending_threshold.is_finite() {
            a.trending_threshold = AnalysisConfig::default().trending_threshold;
        }
        a.trending_threshold = a
            .trending_threshold
            .clamp(TRENDING_THRESHOLD_RANGE.0, TRENDING_THRESHOLD_RANGE.1);
        if !a.sentiment_threshold.is_finite() {
            a.sentiment_threshold = AnalysisConfig::default().sentiment_threshold;
        }
        a.sentiment_threshold = a.sentiment_threshold.clamp(0.0, 1.0);
        a.keyword_ngram_max = a.keyword_ngram_max.clamp(1, 2);
        self.normalize.clock_skew_secs = self.normalize.clock_skew_secs.max(0);
        self
    }
}

fn resolve_path() -> Result<Option<PathBuf>> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display()));
    }
    for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return Ok(Some(pb));
        }
    }
    Ok(None)
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(target: "config", key, value = %raw, "ignoring invalid env override");
            None
        }
    }
}

fn parse_threshold_env(raw: Option<String>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(TRENDING_THRESHOLD_RANGE.0, TRENDING_THRESHOLD_RANGE.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_all_defaults() {
        let cfg = EngineConfig::parse("", "toml").unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.quality.summary_min_words, 20);
        assert_eq!(cfg.analysis.sentiment_threshold, 0.1);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = EngineConfig::parse(
            r#"
[storage]
mode = "append-only"

[analysis]
scope = "new-only"
trending_threshold = 50.0
"#,
            "toml",
        )
        .unwrap();
        assert_eq!(cfg.storage.mode, StorageMode::AppendOnly);
        assert_eq!(cfg.analysis.scope, AnalysisScope::NewOnly);
        assert_eq!(cfg.analysis.trending_threshold, 50.0);
        assert_eq!(cfg.analysis.top_keywords, 20);
    }

    #[test]
    fn json_is_sniffed_without_extension() {
        let cfg = EngineConfig::parse(r#"{"quality":{"summary_min_words":5}}"#, "").unwrap();
        assert_eq!(cfg.quality.summary_min_words, 5);
    }

    #[test]
    fn sanitize_clamps_out_of_range_values() {
        let mut cfg = EngineConfig::default();
        cfg.analysis.keyword_ngram_max = 7;
        cfg.analysis.sentiment_threshold = 4.0;
        let cfg = cfg.sanitized();
        assert_eq!(cfg.analysis.keyword_ngram_max, 2);
        assert_eq!(cfg.analysis.sentiment_threshold, 1.0);
    }

    #[test]
    fn threshold_env_parsing() {
        assert_eq!(parse_threshold_env(Some(" 35.5 ".into())), Some(35.5));
        assert_eq!(parse_threshold_env(Some("abc".into())), None);
        assert_eq!(parse_threshold_env(Some("1e9".into())), Some(10_000.0));
        assert_eq!(parse_threshold_env(None), None);
    }
}
