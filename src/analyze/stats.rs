// src/analyze/stats.rs
//! General counters and author statistics for an analysed question set.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Author, Question};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CounterStats {
    pub mean: f64,
    pub median: f64,
    pub max: u64,
    /// Sample standard deviation; 0 for fewer than two values.
    pub std_dev: f64,
}

impl CounterStats {
    pub fn from_values(values: &[u64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<u64>() as f64 / n;
        let std_dev = if values.len() < 2 {
            0.0
        } else {
            let var = values
                .iter()
                .map(|v| (*v as f64 - mean).powi(2))
                .sum::<f64>()
                / (n - 1.0);
            var.sqrt()
        };
        Self {
            mean: round2(mean),
            median: round2(median(values)),
            max: values.iter().copied().max().unwrap_or(0),
            std_dev: round2(std_dev),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn of(questions: &[Question]) -> Option<Self> {
        let start = questions.iter().map(|q| q.publication_date).min()?;
        let end = questions.iter().map(|q| q.publication_date).max()?;
        Some(Self { start, end })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralStats {
    pub total_questions: usize,
    pub views: CounterStats,
    pub votes: CounterStats,
    pub answers: CounterStats,
    /// Fraction with at least one answer.
    pub response_rate: f64,
    pub unanswered_rate: f64,
    pub unique_tags: usize,
    pub avg_tags_per_question: f64,
    pub most_common_tags: Vec<TagCount>,
    pub date_range: Option<DateRange>,
}

pub fn general_stats(questions: &[Question], top_tags: usize) -> GeneralStats {
    let n = questions.len();
    let pluck = |f: fn(&Question) -> u64| questions.iter().map(f).collect::<Vec<u64>>();
    let answered = questions.iter().filter(|q| q.answer_count > 0).count();

    let mut tags: BTreeMap<String, usize> = BTreeMap::new();
    let mut tag_refs = 0usize;
    for q in questions {
        for t in &q.tags {
            *tags.entry(t.to_lowercase()).or_default() += 1;
            tag_refs += 1;
        }
    }
    let unique_tags = tags.len();
    let mut most_common: Vec<TagCount> = tags
        .into_iter()
        .map(|(tag, count)| TagCount { tag, count })
        .collect();
    most_common.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    most_common.truncate(top_tags);

    let ratio = |k: usize| if n == 0 { 0.0 } else { round4(k as f64 / n as f64) };

    GeneralStats {
        total_questions: n,
        views: CounterStats::from_values(&pluck(|q: &Question| q.view_count)),
        votes: CounterStats::from_values(&pluck(|q: &Question| q.vote_count)),
        answers: CounterStats::from_values(&pluck(|q: &Question| q.answer_count)),
        response_rate: ratio(answered),
        unanswered_rate: ratio(n - answered),
        unique_tags,
        avg_tags_per_question: if n == 0 { 0.0 } else { round2(tag_refs as f64 / n as f64) },
        most_common_tags: most_common,
        date_range: DateRange::of(questions),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub author_name: String,
    /// Questions by this author within the analysed set.
    pub questions_analyzed: usize,
    /// Lifetime count from the registry.
    pub question_count: u64,
    pub reputation: u64,
    pub profile_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReputationStats {
    pub mean: f64,
    pub median: f64,
    pub max: u64,
    pub min: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityStats {
    pub mean_questions_per_author: f64,
    pub median_questions_per_author: f64,
    pub most_active_author: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorAnalysis {
    pub total_authors: usize,
    pub top_authors: Vec<AuthorSummary>,
    pub reputation: Option<ReputationStats>,
    pub activity: ActivityStats,
}

/// Join the analysed questions with registry records. Questions by the unknown
/// sentinel are left out; an author missing from the registry falls back to the
/// reputation seen on their newest question.
pub fn author_analysis(questions: &[Question], registry: &[Author], top_n: usize) -> AuthorAnalysis {
    let records: HashMap<&str, &Author> = registry.iter().map(|a| (a.author_name.as_str(), a)).collect();

    // name -> (count in set, newest question)
    let mut seen: BTreeMap<&str, (usize, &Question)> = BTreeMap::new();
    for q in questions.iter().filter(|q| q.has_known_author()) {
        seen.entry(q.author_name.as_str())
            .and_modify(|(n, newest)| {
                *n += 1;
                if q.publication_date > newest.publication_date {
                    *newest = q;
                }
            })
            .or_insert((1, q));
    }

    let mut summaries: Vec<AuthorSummary> = seen
        .into_iter()
        .map(|(name, (n, newest))| match records.get(name) {
            Some(a) => AuthorSummary {
                author_name: name.to_string(),
                questions_analyzed: n,
                question_count: a.question_count,
                reputation: a.reputation,
                profile_url: a.profile_url.clone(),
            },
            None => AuthorSummary {
                author_name: name.to_string(),
                questions_analyzed: n,
                question_count: n as u64,
                reputation: newest.author_reputation,
                profile_url: newest.author_profile_url.clone(),
            },
        })
        .collect();
    summaries.sort_by(|a, b| {
        b.questions_analyzed
            .cmp(&a.questions_analyzed)
            .then_with(|| a.author_name.cmp(&b.author_name))
    });

    let reps: Vec<u64> = summaries.iter().map(|s| s.reputation).collect();
    let reputation = (!reps.is_empty()).then(|| {
        let stats = CounterStats::from_values(&reps);
        ReputationStats {
            mean: stats.mean,
            median: stats.median,
            max: stats.max,
            min: reps.iter().copied().min().unwrap_or(0),
        }
    });

    let per_author: Vec<u64> = summaries.iter().map(|s| s.questions_analyzed as u64).collect();
    let activity = if per_author.is_empty() {
        ActivityStats::default()
    } else {
        let stats = CounterStats::from_values(&per_author);
        ActivityStats {
            mean_questions_per_author: stats.mean,
            median_questions_per_author: stats.median,
            most_active_author: summaries.first().map(|s| s.author_name.clone()),
        }
    };

    let total_authors = summaries.len();
    summaries.truncate(top_n);
    AuthorAnalysis {
        total_authors,
        top_authors: summaries,
        reputation,
        activity,
    }
}

fn median(values: &[u64]) -> f64 {
    let mut v = values.to_vec();
    v.sort_unstable();
    let mid = v.len() / 2;
    match v.len() {
        0 => 0.0,
        len if len % 2 == 1 => v[mid] as f64,
        _ => (v[mid - 1] as f64 + v[mid] as f64) / 2.0,
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}
