// src/analyze/keywords.rs
//! TF-IDF keyword ranking over one text view of the analysed questions.
//!
//! Each question is one document. IDF comes from the analysed set only, smoothed as
//! `ln((1 + n) / (1 + df)) + 1`; every document vector is L2-normalized and a term's
//! score is its mean weight across the documents. Bigrams are built from adjacent
//! terms after stop-word removal.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::text;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordScore {
    pub term: String,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    ngram_max: usize,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(2)
    }
}

impl KeywordExtractor {
    pub fn new(ngram_max: usize) -> Self {
        Self {
            ngram_max: ngram_max.clamp(1, 2),
        }
    }

    /// Top `top_n` terms, score descending, ties by term ascending.
    /// Documents left empty by preprocessing do not take part.
    pub fn extract<S: AsRef<str>>(&self, docs: &[S], top_n: usize) -> Vec<KeywordScore> {
        let bags: Vec<BTreeMap<String, f64>> = docs
            .iter()
            .map(|d| self.bag(d.as_ref()))
            .filter(|b| !b.is_empty())
            .collect();
        if bags.is_empty() || top_n == 0 {
            return Vec::new();
        }

        let n = bags.len() as f64;
        let mut df: BTreeMap<&str, f64> = BTreeMap::new();
        for bag in &bags {
            for term in bag.keys() {
                *df.entry(term.as_str()).or_default() += 1.0;
            }
        }
        let idf: BTreeMap<&str, f64> = df
            .iter()
            .map(|(t, d)| (*t, ((1.0 + n) / (1.0 + d)).ln() + 1.0))
            .collect();

        let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
        for bag in &bags {
            let weights: Vec<(&str, f64)> = bag
                .iter()
                .map(|(t, tf)| (t.as_str(), tf * idf.get(t.as_str()).copied().unwrap_or(1.0)))
                .collect();
            let norm = weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
            if norm == 0.0 {
                continue;
            }
            for (t, w) in weights {
                *totals.entry(t).or_default() += w / norm;
            }
        }

        let mut scored: Vec<KeywordScore> = totals
            .into_iter()
            .map(|(term, total)| KeywordScore {
                term: term.to_string(),
                score: round4(total / n),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.term.cmp(&b.term)));
        scored.truncate(top_n);
        scored
    }

    /// Raw term counts for one document, bigrams included when enabled.
    fn bag(&self, doc: &str) -> BTreeMap<String, f64> {
        let terms = text::terms(doc);
        let mut bag = BTreeMap::new();
        for t in &terms {
            *bag.entry(t.clone()).or_insert(0.0) += 1.0;
        }
        if self.ngram_max >= 2 {
            for pair in terms.windows(2) {
                *bag.entry(format!("{} {}", pair[0], pair[1])).or_insert(0.0) += 1.0;
            }
        }
        bag
    }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_are_mean_normalized_tfidf() {
        let docs = [
            "python list comprehension",
            "python dict merge",
            "python list sorting",
        ];
        let top = KeywordExtractor::new(1).extract(&docs, 10);
        let score = |t: &str| top.iter().find(|k| k.term == t).map(|k| k.score).unwrap();
        assert!((score("python") - 0.4121).abs() < 1e-3);
        assert!((score("list") - 0.3652).abs() < 1e-3);
        assert!((score("merge") - 0.2175).abs() < 1e-3);
        assert!(score("comprehension") > score("merge"));
        assert_eq!(top[0].term, "python");
        assert!(top.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn ties_break_lexicographically() {
        let docs = ["alpha beta", "gamma delta"];
        let top = KeywordExtractor::new(1).extract(&docs, 4);
        let terms: Vec<&str> = top.iter().map(|k| k.term.as_str()).collect();
        assert_eq!(terms, vec!["alpha", "beta", "delta", "gamma"]);
    }

    #[test]
    fn bigrams_follow_stopword_removal() {
        let top = KeywordExtractor::new(2).extract(&["error in the borrow checker"], 10);
        assert!(top.iter().any(|k| k.term == "borrow checker"));
        assert!(top.iter().any(|k| k.term == "error borrow"));
        assert!(!top.iter().any(|k| k.term.contains("the")));
    }

    #[test]
    fn empty_corpus_yields_nothing() {
        let docs: [&str; 2] = ["", "the and of"];
        assert!(KeywordExtractor::default().extract(&docs, 5).is_empty());
    }

    #[test]
    fn rankings_depend_on_analysed_set() {
        let ex = KeywordExtractor::new(1);
        let a = ex.extract(&["rust async", "rust tokio"], 1);
        let b = ex.extract(&["rust async", "go async"], 1);
        assert_ne!(a[0].term, b[0].term);
    }
}
