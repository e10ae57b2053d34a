// src/analyze/trends.rs
//! # Tag trends
//! Windows are anchored on the newest `publication_date` in the analysed set, not on
//! the wall clock, so historical data produces the same numbers on every run.
//!
//! Windows are half-open and end at the reference date:
//! last week `(ref - 7d, ref]`, previous week `(ref - 14d, ref - 7d]`,
//! last month `(ref - 30d, ref]`, last quarter `(ref - 90d, ref]`.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::temporal::{temporal_patterns, TemporalPatterns};
use crate::model::Question;

/// Week-over-week growth. `Undefined` when the previous week had no questions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum GrowthRate {
    Finite(f64),
    Undefined,
}

impl GrowthRate {
    pub fn between(last_week: usize, previous_week: usize) -> Self {
        if previous_week == 0 {
            return GrowthRate::Undefined;
        }
        let pct = (last_week as f64 / previous_week as f64 - 1.0) * 100.0;
        GrowthRate::Finite((pct * 100.0).round() / 100.0)
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            GrowthRate::Finite(v) => Some(*v),
            GrowthRate::Undefined => None,
        }
    }

    /// Strictly greater than `threshold`; undefined growth never exceeds anything.
    pub fn exceeds(&self, threshold: f64) -> bool {
        matches!(self, GrowthRate::Finite(v) if *v > threshold)
    }
}

impl From<Option<f64>> for GrowthRate {
    fn from(v: Option<f64>) -> Self {
        match v {
            Some(x) if x.is_finite() => GrowthRate::Finite(x),
            _ => GrowthRate::Undefined,
        }
    }
}

impl From<GrowthRate> for Option<f64> {
    fn from(g: GrowthRate) -> Self {
        g.value()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagTrend {
    pub tag: String,
    pub total_questions: usize,
    pub last_week: usize,
    pub previous_week: usize,
    pub last_month: usize,
    pub last_quarter: usize,
    pub growth_rate: GrowthRate,
    pub trending: bool,
    /// Seen this week and not the week before.
    pub emerging: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagTrends {
    pub reference_date: Option<DateTime<Utc>>,
    pub unique_tags: usize,
    /// `total_questions` desc, then case-folded tag asc. Capped at the configured top-N.
    pub tags: Vec<TagTrend>,
    /// Tags whose growth exceeds the threshold, fastest first.
    pub trending: Vec<String>,
    pub emerging: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub tag_trends: TagTrends,
    pub temporal_patterns: TemporalPatterns,
}

#[derive(Debug, Clone)]
pub struct TrendAnalyzer {
    trending_threshold: f64,
    top_tags: usize,
}

impl TrendAnalyzer {
    pub fn new(trending_threshold: f64, top_tags: usize) -> Self {
        Self {
            trending_threshold,
            top_tags,
        }
    }

    pub fn compute(&self, questions: &[Question]) -> TrendReport {
        TrendReport {
            tag_trends: self.tag_trends(questions),
            temporal_patterns: temporal_patterns(questions),
        }
    }

    pub fn tag_trends(&self, questions: &[Question]) -> TagTrends {
        let Some(reference) = questions.iter().map(|q| q.publication_date).max() else {
            return TagTrends {
                reference_date: None,
                unique_tags: 0,
                tags: Vec::new(),
                trending: Vec::new(),
                emerging: Vec::new(),
            };
        };
        let within = |d: DateTime<Utc>, from_days: i64, to_days: i64| {
            d > reference - Duration::days(from_days) && d <= reference - Duration::days(to_days)
        };

        #[derive(Default)]
        struct Counts {
            total: usize,
            week: usize,
            prev_week: usize,
            month: usize,
            quarter: usize,
        }

        // Tags are case-insensitive; the first spelling seen is the label.
        let mut by_tag: BTreeMap<String, (String, Counts)> = BTreeMap::new();
        for q in questions {
            let d = q.publication_date;
            for tag in &q.tags {
                let (_, c) = by_tag
                    .entry(tag.to_lowercase())
                    .or_insert_with(|| (tag.clone(), Counts::default()));
                c.total += 1;
                c.week += within(d, 7, 0) as usize;
                c.prev_week += within(d, 14, 7) as usize;
                c.month += within(d, 30, 0) as usize;
                c.quarter += within(d, 90, 0) as usize;
            }
        }

        let mut all: Vec<TagTrend> = by_tag
            .into_values()
            .map(|(tag, c)| {
                let growth_rate = GrowthRate::between(c.week, c.prev_week);
                TagTrend {
                    trending: growth_rate.exceeds(self.trending_threshold),
                    emerging: c.prev_week == 0 && c.week > 0,
                    tag,
                    total_questions: c.total,
                    last_week: c.week,
                    previous_week: c.prev_week,
                    last_month: c.month,
                    last_quarter: c.quarter,
                    growth_rate,
                }
            })
            .collect();
        // Ties break on the case-folded tag, same as the general stats.
        all.sort_by(|a, b| {
            b.total_questions
                .cmp(&a.total_questions)
                .then_with(|| a.tag.to_lowercase().cmp(&b.tag.to_lowercase()))
        });

        let mut trending: Vec<&TagTrend> = all.iter().filter(|t| t.trending).collect();
        trending.sort_by(|a, b| {
            let (ga, gb) = (a.growth_rate.value().unwrap_or(0.0), b.growth_rate.value().unwrap_or(0.0));
            gb.total_cmp(&ga)
                .then_with(|| a.tag.to_lowercase().cmp(&b.tag.to_lowercase()))
        });
        let trending = trending.into_iter().map(|t| t.tag.clone()).collect();
        let emerging = all.iter().filter(|t| t.emerging).map(|t| t.tag.clone()).collect();

        let unique_tags = all.len();
        all.truncate(self.top_tags);

        TagTrends {
            reference_date: Some(reference),
            unique_tags,
            tags: all,
            trending,
            emerging,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn q(id: u64, days_ago: i64, tags: &[&str]) -> Question {
        let base = Utc.with_ymd_and_hms(2025, 3, 31, 12, 0, 0).unwrap();
        Question {
            question_id: id,
            title: format!("t{id}"),
            url: String::new(),
            summary: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            author_name: "a".into(),
            author_profile_url: String::new(),
            author_reputation: 0,
            view_count: 0,
            vote_count: 0,
            answer_count: 0,
            publication_date: base - Duration::days(days_ago),
            stored_at: None,
            last_updated: None,
        }
    }

    #[test]
    fn growth_rate_handles_empty_previous_week() {
        assert_eq!(GrowthRate::between(3, 0), GrowthRate::Undefined);
        assert_eq!(GrowthRate::between(0, 0), GrowthRate::Undefined);
        assert_eq!(GrowthRate::between(3, 2), GrowthRate::Finite(50.0));
        assert_eq!(GrowthRate::between(1, 2), GrowthRate::Finite(-50.0));
        assert!(!GrowthRate::Undefined.exceeds(-1000.0));
    }

    #[test]
    fn growth_rate_serializes_as_nullable_number() {
        assert_eq!(serde_json::to_string(&GrowthRate::Undefined).unwrap(), "null");
        assert_eq!(serde_json::to_string(&GrowthRate::Finite(12.5)).unwrap(), "12.5");
        let back: GrowthRate = serde_json::from_str("null").unwrap();
        assert_eq!(back, GrowthRate::Undefined);
    }

    #[test]
    fn windows_are_relative_to_newest_question() {
        let qs = vec![
            q(1, 0, &["rust"]),
            q(2, 3, &["rust"]),
            q(3, 10, &["rust"]),
            q(4, 20, &["rust", "go"]),
            q(5, 60, &["go"]),
        ];
        let trends = TrendAnalyzer::new(20.0, 10).tag_trends(&qs);
        let rust = &trends.tags[0];
        assert_eq!(rust.tag, "rust");
        assert_eq!(
            (rust.total_questions, rust.last_week, rust.previous_week, rust.last_month),
            (4, 2, 1, 4)
        );
        assert_eq!(rust.growth_rate, GrowthRate::Finite(100.0));
        assert!(rust.trending);

        let go = &trends.tags[1];
        assert_eq!((go.last_month, go.last_quarter), (1, 2));
        assert_eq!(go.growth_rate, GrowthRate::Undefined);
        assert!(!go.trending && !go.emerging);
        assert_eq!(trends.trending, vec!["rust"]);
    }

    #[test]
    fn ordering_is_total_desc_then_tag() {
        let qs = vec![q(1, 0, &["b"]), q(2, 0, &["a"]), q(3, 1, &["c", "a"])];
        let trends = TrendAnalyzer::new(20.0, 10).tag_trends(&qs);
        let order: Vec<&str> = trends.tags.iter().map(|t| t.tag.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert_eq!(trends.emerging, vec!["a", "b", "c"]);
    }

    #[test]
    fn exactly_threshold_is_not_trending() {
        // 6 vs 5 => 20% growth, threshold 20 => not trending.
        let mut qs = Vec::new();
        for i in 0..6 {
            qs.push(q(i, 1, &["x"]));
        }
        for i in 6..11 {
            qs.push(q(i, 8, &["x"]));
        }
        let trends = TrendAnalyzer::new(20.0, 10).tag_trends(&qs);
        assert_eq!(trends.tags[0].growth_rate, GrowthRate::Finite(20.0));
        assert!(!trends.tags[0].trending);
    }

    #[test]
    fn empty_set_has_no_reference_date() {
        let trends = TrendAnalyzer::new(20.0, 10).tag_trends(&[]);
        assert!(trends.reference_date.is_none());
        assert!(trends.tags.is_empty());
    }
}
