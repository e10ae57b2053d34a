// src/analyze/temporal.rs
//! Posting patterns by hour of day, day of week and month (all UTC).

use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};

use crate::model::Question;

pub const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

pub const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// One bucket. Means are `None` for empty buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub label: String,
    pub count: usize,
    pub mean_votes: Option<f64>,
    pub mean_answers: Option<f64>,
    pub mean_views: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalPatterns {
    /// 24 buckets, index = hour.
    pub hourly: Vec<Bucket>,
    /// 7 buckets, Monday first.
    pub daily: Vec<Bucket>,
    /// 12 buckets, January first.
    pub monthly: Vec<Bucket>,
    pub peak_hour: Option<u32>,
    pub peak_day: Option<String>,
    pub peak_month: Option<String>,
}

#[derive(Default, Clone, Copy)]
struct Acc {
    count: usize,
    votes: u64,
    answers: u64,
    views: u64,
}

impl Acc {
    fn add(&mut self, q: &Question) {
        self.count += 1;
        self.votes += q.vote_count;
        self.answers += q.answer_count;
        self.views += q.view_count;
    }

    fn bucket(&self, label: String) -> Bucket {
        let mean = |sum: u64| (self.count > 0).then(|| round2(sum as f64 / self.count as f64));
        Bucket {
            label,
            count: self.count,
            mean_votes: mean(self.votes),
            mean_answers: mean(self.answers),
            mean_views: mean(self.views),
        }
    }
}

pub fn temporal_patterns(questions: &[Question]) -> TemporalPatterns {
    let mut hours = [Acc::default(); 24];
    let mut days = [Acc::default(); 7];
    let mut months = [Acc::default(); 12];

    for q in questions {
        let d = q.publication_date;
        hours[d.hour() as usize].add(q);
        days[d.weekday().num_days_from_monday() as usize].add(q);
        months[d.month0() as usize].add(q);
    }

    TemporalPatterns {
        peak_hour: peak(&hours).map(|i| i as u32),
        peak_day: peak(&days).map(|i| WEEKDAYS[i].to_string()),
        peak_month: peak(&months).map(|i| MONTHS[i].to_string()),
        hourly: hours
            .iter()
            .enumerate()
            .map(|(h, a)| a.bucket(format!("{h:02}:00")))
            .collect(),
        daily: days
            .iter()
            .zip(WEEKDAYS)
            .map(|(a, name)| a.bucket(name.to_string()))
            .collect(),
        monthly: months
            .iter()
            .zip(MONTHS)
            .map(|(a, name)| a.bucket(name.to_string()))
            .collect(),
    }
}

/// Index of the fullest bucket, lowest index on ties; `None` when all are empty.
fn peak(buckets: &[Acc]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, b) in buckets.iter().enumerate() {
        if b.count == 0 {
            continue;
        }
        match best {
            Some(j) if buckets[j].count >= b.count => {}
            _ => best = Some(i),
        }
    }
    best
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn q(id: u64, y: i32, m: u32, d: u32, h: u32, votes: u64, answers: u64) -> Question {
        Question {
            question_id: id,
            title: "t".into(),
            url: String::new(),
            summary: String::new(),
            tags: vec!["x".into()],
            author_name: "a".into(),
            author_profile_url: String::new(),
            author_reputation: 0,
            view_count: 10,
            vote_count: votes,
            answer_count: answers,
            publication_date: Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap(),
            stored_at: None,
            last_updated: None,
        }
    }

    #[test]
    fn buckets_and_means() {
        // 2025-01-06 is a Monday.
        let qs = vec![
            q(1, 2025, 1, 6, 9, 4, 1),
            q(2, 2025, 1, 7, 9, 2, 0),
            q(3, 2025, 2, 7, 15, 0, 3),
        ];
        let t = temporal_patterns(&qs);
        assert_eq!(t.hourly.len(), 24);
        assert_eq!(t.hourly[9].count, 2);
        assert_eq!(t.hourly[9].mean_votes, Some(3.0));
        assert_eq!(t.hourly[9].mean_answers, Some(0.5));
        assert_eq!(t.hourly[0].count, 0);
        assert_eq!(t.hourly[0].mean_votes, None);
        assert_eq!(t.peak_hour, Some(9));
        assert_eq!(t.daily[0].label, "Monday");
        assert_eq!(t.daily[0].count, 1);
        assert_eq!(t.monthly[0].count, 2);
        assert_eq!(t.peak_month.as_deref(), Some("January"));
    }

    #[test]
    fn peak_ties_pick_lowest_bucket() {
        let qs = vec![q(1, 2025, 1, 6, 18, 0, 0), q(2, 2025, 1, 6, 7, 0, 0)];
        let t = temporal_patterns(&qs);
        assert_eq!(t.peak_hour, Some(7));
    }

    #[test]
    fn empty_input_has_no_peaks() {
        let t = temporal_patterns(&[]);
        assert_eq!(t.peak_hour, None);
        assert_eq!(t.peak_day, None);
        assert!(t.daily.iter().all(|b| b.count == 0 && b.mean_views.is_none()));
    }
}
