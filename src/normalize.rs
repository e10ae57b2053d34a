// src/normalize.rs
//! # Record Normalizer
//! Validates and coerces loosely typed extracted records into canonical [`Question`]s.
//!
//! Records arrive as JSON objects from either the API collaborator (typed numbers,
//! unix timestamps) or the scraper (strings such as `"1.2k"`, `"2025-01-06 09:00:00Z"`,
//! HTML entities in titles). Everything untyped stops here: the store only ever
//! sees `Question`.
//!
//! Pure: no I/O, no clock access except through [`RecordNormalizer::normalize`].

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::ValidationError;
use crate::model::{Question, UNKNOWN_AUTHOR};

/// Default tolerance for publication dates slightly ahead of our clock.
pub const DEFAULT_CLOCK_SKEW_SECS: i64 = 5;

/// Longest summary we keep (characters).
const SUMMARY_CAP: usize = 5_000;

// Accepted spellings per canonical field, first match wins.
const ID_KEYS: &[&str] = &["question_id", "id"];
const TITLE_KEYS: &[&str] = &["title"];
const URL_KEYS: &[&str] = &["url", "link"];
const SUMMARY_KEYS: &[&str] = &["summary", "excerpt", "body"];
const TAGS_KEYS: &[&str] = &["tags"];
const AUTHOR_KEYS: &[&str] = &["author_name", "author", "display_name"];
const PROFILE_KEYS: &[&str] = &["author_profile_url", "profile_url"];
const REPUTATION_KEYS: &[&str] = &["author_reputation", "reputation"];
const VIEWS_KEYS: &[&str] = &["view_count", "views"];
const VOTES_KEYS: &[&str] = &["vote_count", "score", "votes"];
const ANSWERS_KEYS: &[&str] = &["answer_count", "answers"];
const DATE_KEYS: &[&str] = &["publication_date", "pub_date", "creation_date"];

/// Outcome of normalizing a batch: accepted questions plus per-record failures
/// (index into the input, error).
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub questions: Vec<Question>,
    pub rejected: Vec<(usize, ValidationError)>,
}

#[derive(Debug, Clone)]
pub struct RecordNormalizer {
    clock_skew: Duration,
}

impl Default for RecordNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_CLOCK_SKEW_SECS)
    }
}

impl RecordNormalizer {
    pub fn new(clock_skew_secs: i64) -> Self {
        Self {
            clock_skew: Duration::seconds(clock_skew_secs.max(0)),
        }
    }

    /// Normalize against the current wall clock.
    pub fn normalize(&self, raw: &Value) -> Result<Question, ValidationError> {
        self.normalize_at(raw, Utc::now())
    }

    /// Normalize with an explicit "now" (used for the future-date check).
    pub fn normalize_at(&self, raw: &Value, now: DateTime<Utc>) -> Result<Question, ValidationError> {
        let obj = raw
            .as_object()
            .ok_or_else(|| ValidationError::new("record", "expected a JSON object"))?;

        let question_id = parse_id(lookup(obj, ID_KEYS))?;

        let title = clean_text(lookup(obj, TITLE_KEYS).and_then(Value::as_str).unwrap_or_default());
        if title.is_empty() {
            return Err(ValidationError::new("title", "must not be empty"));
        }

        let tags = parse_tags(lookup(obj, TAGS_KEYS))?;

        let publication_date = parse_date(lookup(obj, DATE_KEYS))?;
        if publication_date > now + self.clock_skew {
            return Err(ValidationError::new(
                "publication_date",
                format!("{} is in the future", publication_date.to_rfc3339()),
            ));
        }

        let mut summary = clean_text(lookup(obj, SUMMARY_KEYS).and_then(Value::as_str).unwrap_or_default());
        if summary.chars().count() > SUMMARY_CAP {
            summary = summary.chars().take(SUMMARY_CAP).collect();
        }

        let author_name = {
            let a = clean_text(lookup(obj, AUTHOR_KEYS).and_then(Value::as_str).unwrap_or_default());
            if a.is_empty() {
                UNKNOWN_AUTHOR.to_string()
            } else {
                a
            }
        };

        Ok(Question {
            question_id,
            title,
            url: plain_str(lookup(obj, URL_KEYS)),
            summary,
            tags,
            author_name,
            author_profile_url: plain_str(lookup(obj, PROFILE_KEYS)),
            author_reputation: parse_count(lookup(obj, REPUTATION_KEYS), "author_reputation")?,
            view_count: parse_count(lookup(obj, VIEWS_KEYS), "view_count")?,
            vote_count: parse_count(lookup(obj, VOTES_KEYS), "vote_count")?,
            answer_count: parse_count(lookup(obj, ANSWERS_KEYS), "answer_count")?,
            publication_date,
            stored_at: None,
            last_updated: None,
        })
    }

    /// Normalize every record; failures are logged and collected, never fatal.
    pub fn normalize_batch(&self, raws: &[Value]) -> NormalizedBatch {
        let now = Utc::now();
        let mut out = NormalizedBatch::default();
        for (idx, raw) in raws.iter().enumerate() {
            match self.normalize_at(raw, now) {
                Ok(q) => out.questions.push(q),
                Err(e) => {
                    warn!(target: "normalize", index = idx, field = e.field, reason = %e.reason, "record rejected");
                    out.rejected.push((idx, e));
                }
            }
        }
        out
    }
}

fn lookup<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn plain_str(v: Option<&Value>) -> String {
    v.and_then(Value::as_str).map(|s| s.trim().to_string()).unwrap_or_default()
}

/// Strip markup, decode HTML entities, normalize typographic quotes and collapse whitespace.
///
/// Tags go before entities so escaped text such as `Vec&lt;String&gt;` survives.
pub fn clean_text(s: &str) -> String {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[a-z][^>]*>").expect("tag regex"));
    let stripped = re_tags.replace_all(s, " ");

    let mut out = html_escape::decode_html_entities(&stripped).to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_id(v: Option<&Value>) -> Result<u64, ValidationError> {
    const FIELD: &str = "question_id";
    let v = v.ok_or_else(|| ValidationError::new(FIELD, "missing"))?;
    let id = match v {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u
            } else {
                return Err(ValidationError::new(FIELD, format!("`{n}` is not a positive integer")));
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| ValidationError::new(FIELD, format!("`{s}` is not a positive integer")))?,
        other => {
            return Err(ValidationError::new(FIELD, format!("unexpected value `{other}`")));
        }
    };
    if id == 0 {
        return Err(ValidationError::new(FIELD, "must be a positive integer"));
    }
    Ok(id)
}

/// Non-negative counter. Absent/null → 0. Accepts `"1,234"`, `"1.2k"`, `"3m"`.
fn parse_count(v: Option<&Value>, field: &'static str) -> Result<u64, ValidationError> {
    let Some(v) = v else {
        return Ok(0);
    };
    match v {
        Value::Null => Ok(0),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return Ok(u);
            }
            match n.as_f64() {
                Some(f) if f < 0.0 => Err(ValidationError::new(field, format!("negative value {n}"))),
                Some(f) if f.is_finite() => Ok(f.round() as u64),
                _ => Err(ValidationError::new(field, format!("unusable number {n}"))),
            }
        }
        Value::String(s) => parse_count_str(s, field),
        other => Err(ValidationError::new(field, format!("unexpected value `{other}`"))),
    }
}

fn parse_count_str(s: &str, field: &'static str) -> Result<u64, ValidationError> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | ' ' | '\u{00A0}'))
        .collect::<String>()
        .to_ascii_lowercase();
    if cleaned.is_empty() {
        return Ok(0);
    }
    if cleaned.starts_with('-') {
        return Err(ValidationError::new(field, format!("negative value `{s}`")));
    }
    let (digits, factor) = match cleaned.chars().last() {
        Some('k') => (&cleaned[..cleaned.len() - 1], 1_000.0),
        Some('m') => (&cleaned[..cleaned.len() - 1], 1_000_000.0),
        _ => (cleaned.as_str(), 1.0),
    };
    let value: f64 = digits
        .parse()
        .map_err(|_| ValidationError::new(field, format!("`{s}` is not a number")))?;
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::new(field, format!("`{s}` is not a usable count")));
    }
    Ok((value * factor).round() as u64)
}

/// Trim, drop empties, dedup case-insensitively keeping first-seen casing and order.
fn parse_tags(v: Option<&Value>) -> Result<Vec<String>, ValidationError> {
    const FIELD: &str = "tags";
    let raw: Vec<String> = match v {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|it| match it {
                Value::String(s) => Ok(s.clone()),
                other => Err(ValidationError::new(FIELD, format!("non-string tag `{other}`"))),
            })
            .collect::<Result<_, _>>()?,
        Some(Value::String(s)) => s
            .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
            .map(str::to_string)
            .collect(),
        Some(other) => {
            return Err(ValidationError::new(FIELD, format!("unexpected value `{other}`")));
        }
    };

    let mut seen = std::collections::HashSet::new();
    let mut tags = Vec::with_capacity(raw.len());
    for t in raw {
        let t = t.trim();
        if t.is_empty() {
            continue;
        }
        if seen.insert(t.to_lowercase()) {
            tags.push(t.to_string());
        }
    }
    if tags.is_empty() {
        return Err(ValidationError::new(FIELD, "must contain at least one tag"));
    }
    Ok(tags)
}

fn parse_date(v: Option<&Value>) -> Result<DateTime<Utc>, ValidationError> {
    const FIELD: &str = "publication_date";
    let v = v.ok_or_else(|| ValidationError::new(FIELD, "missing"))?;
    match v {
        Value::Number(n) => {
            let secs = n
                .as_i64()
                .ok_or_else(|| ValidationError::new(FIELD, format!("`{n}` is not a unix timestamp")))?;
            Utc.timestamp_opt(secs, 0)
                .single()
                .ok_or_else(|| ValidationError::new(FIELD, format!("`{n}` is out of range")))
        }
        Value::String(s) => parse_date_str(s.trim())
            .ok_or_else(|| ValidationError::new(FIELD, format!("unrecognized date `{s}`"))),
        other => Err(ValidationError::new(FIELD, format!("unexpected value `{other}`"))),
    }
}

fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(secs) = s.parse::<i64>() {
        return Utc.timestamp_opt(secs, 0).single();
    }
    let naive = s.trim_end_matches('Z').trim_end_matches('z');
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }
    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn base() -> Value {
        json!({
            "question_id": "42",
            "title": "  How do I &amp; why <b>borrow</b>?  ",
            "url": "https://forum.test/q/42",
            "summary": "",
            "tags": ["Rust", " rust ", "tokio", ""],
            "author_name": "ana",
            "author_reputation": "1.2k",
            "view_count": "1,034",
            "publication_date": "2025-02-28 10:00:00Z"
        })
    }

    #[test]
    fn coerces_scraped_fields() {
        let q = RecordNormalizer::default().normalize_at(&base(), now()).unwrap();
        assert_eq!(q.question_id, 42);
        assert_eq!(q.title, "How do I & why borrow ?");
        assert_eq!(q.tags, vec!["Rust".to_string(), "tokio".to_string()]);
        assert_eq!(q.author_reputation, 1_200);
        assert_eq!(q.view_count, 1_034);
        assert_eq!(q.vote_count, 0);
        assert_eq!(q.answer_count, 0);
        assert_eq!(q.publication_date, Utc.with_ymd_and_hms(2025, 2, 28, 10, 0, 0).unwrap());
        assert!(q.stored_at.is_none());
    }

    #[test]
    fn escaped_generics_survive_markup_stripping() {
        assert_eq!(
            clean_text("Why does Vec&lt;String&gt; not implement <code>Copy</code>?"),
            "Why does Vec<String> not implement Copy ?"
        );
        let mut r = base();
        r["title"] = json!("HashMap&lt;K, V&gt; &amp; <i>lifetimes</i>");
        let q = RecordNormalizer::default().normalize_at(&r, now()).unwrap();
        assert_eq!(q.title, "HashMap<K, V> & lifetimes");
    }

    #[test]
    fn rejects_non_positive_id() {
        let n = RecordNormalizer::default();
        for bad in [json!(0), json!(-3), json!("abc"), json!(1.5)] {
            let mut r = base();
            r["question_id"] = bad;
            assert_eq!(n.normalize_at(&r, now()).unwrap_err().field, "question_id");
        }
    }

    #[test]
    fn rejects_negative_counters_but_defaults_missing() {
        let n = RecordNormalizer::default();
        let mut r = base();
        r["answer_count"] = json!(-1);
        assert_eq!(n.normalize_at(&r, now()).unwrap_err().field, "answer_count");

        let mut r = base();
        r["vote_count"] = json!("-4");
        assert_eq!(n.normalize_at(&r, now()).unwrap_err().field, "vote_count");

        let mut r = base();
        r["vote_count"] = Value::Null;
        assert_eq!(n.normalize_at(&r, now()).unwrap().vote_count, 0);
    }

    #[test]
    fn rejects_blank_title_and_empty_tags() {
        let n = RecordNormalizer::default();
        let mut r = base();
        r["title"] = json!("   ");
        assert_eq!(n.normalize_at(&r, now()).unwrap_err().field, "title");

        let mut r = base();
        r["tags"] = json!([" ", ""]);
        assert_eq!(n.normalize_at(&r, now()).unwrap_err().field, "tags");
    }

    #[test]
    fn future_dates_respect_skew() {
        let n = RecordNormalizer::new(5);
        let mut r = base();
        r["publication_date"] = json!((now() + Duration::seconds(3)).to_rfc3339());
        assert!(n.normalize_at(&r, now()).is_ok());

        r["publication_date"] = json!((now() + Duration::minutes(2)).to_rfc3339());
        assert_eq!(n.normalize_at(&r, now()).unwrap_err().field, "publication_date");
    }

    #[test]
    fn accepts_unix_dates_and_tag_strings() {
        let r = json!({
            "id": 9,
            "title": "Q",
            "tags": "python, go;python",
            "creation_date": 1_735_689_600,
            "author": "bo"
        });
        let q = RecordNormalizer::default().normalize_at(&r, now()).unwrap();
        assert_eq!(q.tags, vec!["python".to_string(), "go".to_string()]);
        assert_eq!(q.publication_date, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(q.author_name, "bo");
    }

    #[test]
    fn missing_author_becomes_unknown() {
        let mut r = base();
        r.as_object_mut().unwrap().remove("author_name");
        let q = RecordNormalizer::default().normalize_at(&r, now()).unwrap();
        assert_eq!(q.author_name, UNKNOWN_AUTHOR);
        assert!(!q.has_known_author());
    }

    #[test]
    fn batch_collects_failures_without_aborting() {
        let mut bad = base();
        bad["title"] = json!("");
        let out = RecordNormalizer::default().normalize_batch(&[base(), bad, json!("nope")]);
        assert_eq!(out.questions.len(), 1);
        assert_eq!(out.rejected.len(), 2);
        assert_eq!(out.rejected[0].0, 1);
        assert_eq!(out.rejected[1].1.field, "record");
    }
}
