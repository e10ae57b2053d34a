// src/sentiment.rs
//! Lexicon sentiment scorer for question text.
//!
//! Words carry an integer weight in -3..=3 (`sentiment_lexicon.json`). A negator in
//! the three preceding tokens flips the sign. Polarity is the summed score over the
//! strongest possible score for the words that hit, so it always lands in [-1, 1].

use std::collections::HashMap;

use once_cell::sync::Lazy;

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).expect("valid sentiment lexicon")
});

const MAX_WORD_SCORE: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextScore {
    /// Sum of (possibly negated) lexicon weights.
    pub score: i32,
    /// Tokens that matched the lexicon.
    pub hits: usize,
    pub tokens: usize,
}

impl TextScore {
    pub fn polarity(&self) -> f64 {
        if self.hits == 0 {
            return 0.0;
        }
        (self.score as f64 / (MAX_WORD_SCORE * self.hits as f64)).clamp(-1.0, 1.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SentimentAnalyzer;

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_score(&self, w: &str) -> i32 {
        *LEXICON.get(w).unwrap_or(&0)
    }

    pub fn score_text(&self, text: &str) -> TextScore {
        // Indexed access: negation looks back.
        let tokens: Vec<String> = tokenize(text).collect();
        let mut score = 0;
        let mut hits = 0;

        for (i, w) in tokens.iter().enumerate() {
            let base = self.word_score(w);
            if base == 0 {
                continue;
            }
            let negated = (1..=3).any(|k| i >= k && is_negator(&tokens[i - k]));
            score += if negated { -base } else { base };
            hits += 1;
        }

        TextScore {
            score,
            hits,
            tokens: tokens.len(),
        }
    }

    /// Polarity in [-1, 1]; 0 for empty or lexicon-free text.
    pub fn polarity(&self, text: &str) -> f64 {
        self.score_text(text).polarity()
    }
}

/// Lowercased alphanumeric tokens; apostrophes stay inside words ("doesn't").
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn is_negator(tok: &str) -> bool {
    tok.ends_with("n't")
        || matches!(
            tok,
            "not" | "no" | "never" | "cannot" | "without" | "nothing" | "neither" | "nor"
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_neutral() {
        let s = SentimentAnalyzer::new();
        assert_eq!(s.polarity(""), 0.0);
        assert_eq!(s.polarity("how to configure tokio runtime"), 0.0);
    }

    #[test]
    fn sign_follows_lexicon() {
        let s = SentimentAnalyzer::new();
        assert!(s.polarity("this crate is excellent and fast") > 0.1);
        assert!(s.polarity("build fails with a terrible error") < -0.1);
    }

    #[test]
    fn negation_flips_within_window() {
        let s = SentimentAnalyzer::new();
        assert!(s.polarity("the fix does not work well, it is broken") < 0.0);
        assert!(s.polarity("it doesn't crash anymore") > 0.0);
    }

    #[test]
    fn polarity_is_bounded() {
        let s = SentimentAnalyzer::new();
        let p = s.polarity("excellent amazing perfect awesome love");
        assert!((-1.0..=1.0).contains(&p));
        assert_eq!(p, 1.0);
    }
}
