// src/analyze/content.rs
//! # Content analysis
//! Keywords, sentiment and quality heuristics over three text views of each
//! question: the title, the summary, and both joined.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::keywords::{KeywordExtractor, KeywordScore};
use super::text;
use crate::config::{AnalysisConfig, QualityConfig};
use crate::model::Question;
use crate::sentiment::SentimentAnalyzer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextView {
    Titles,
    Summaries,
    Combined,
}

impl TextView {
    pub fn text(&self, q: &Question) -> String {
        match self {
            TextView::Titles => q.title.clone(),
            TextView::Summaries => q.summary.clone(),
            TextView::Combined => q.combined_text(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewKeywords {
    pub titles: Vec<KeywordScore>,
    pub summaries: Vec<KeywordScore>,
    pub combined: Vec<KeywordScore>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentSummary {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub total: usize,
    /// Mean over every analysed question, empty texts included as 0.
    pub mean_polarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSentiment {
    pub titles: SentimentSummary,
    pub summaries: SentimentSummary,
    pub combined: SentimentSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LengthStats {
    pub avg_title_chars: f64,
    pub avg_title_words: f64,
    pub avg_summary_chars: f64,
    pub avg_summary_words: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentQuality {
    /// Percent of questions whose summary has more than the configured word count.
    pub summary_completeness: f64,
    /// Fraction (0..=1) of combined-text tokens that are technical.
    pub technical_word_ratio: f64,
    pub technical_term_count: usize,
    /// Fraction (0..=1) of questions with a title and a substantial summary.
    pub question_clarity: f64,
    /// Percent of questions mentioning an advanced topic.
    pub technical_depth: f64,
    pub avg_words_per_question: f64,
    pub length_stats: LengthStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentReport {
    pub keywords: ViewKeywords,
    pub sentiment: ViewSentiment,
    pub content_quality: ContentQuality,
}

#[derive(Debug, Clone)]
pub struct ContentAnalyzer {
    keywords: KeywordExtractor,
    sentiment: SentimentAnalyzer,
    sentiment_threshold: f64,
    top_keywords: usize,
    top_combined_keywords: usize,
    quality: QualityConfig,
    technical_terms: HashSet<String>,
}

impl ContentAnalyzer {
    pub fn new(analysis: &AnalysisConfig, quality: &QualityConfig) -> Self {
        let technical_terms = quality
            .technical_terms
            .iter()
            .map(|t| text::lemmatize(&t.trim().to_lowercase()))
            .filter(|t| !t.is_empty())
            .collect();
        Self {
            keywords: KeywordExtractor::new(analysis.keyword_ngram_max),
            sentiment: SentimentAnalyzer::new(),
            sentiment_threshold: analysis.sentiment_threshold,
            top_keywords: analysis.top_keywords,
            top_combined_keywords: analysis.top_combined_keywords,
            quality: quality.clone(),
            technical_terms,
        }
    }

    pub fn analyze(&self, questions: &[Question]) -> ContentReport {
        ContentReport {
            keywords: ViewKeywords {
                titles: self.keywords_for(questions, TextView::Titles, self.top_keywords),
                summaries: self.keywords_for(questions, TextView::Summaries, self.top_keywords),
                combined: self.keywords_for(questions, TextView::Combined, self.top_combined_keywords),
            },
            sentiment: ViewSentiment {
                titles: self.sentiment_for(questions, TextView::Titles),
                summaries: self.sentiment_for(questions, TextView::Summaries),
                combined: self.sentiment_for(questions, TextView::Combined),
            },
            content_quality: self.quality(questions),
        }
    }

    pub fn keywords_for(&self, questions: &[Question], view: TextView, top_n: usize) -> Vec<KeywordScore> {
        let docs: Vec<String> = questions.iter().map(|q| view.text(q)).collect();
        self.keywords.extract(&docs, top_n)
    }

    pub fn sentiment_for(&self, questions: &[Question], view: TextView) -> SentimentSummary {
        let mut out = SentimentSummary {
            total: questions.len(),
            ..SentimentSummary::default()
        };
        if questions.is_empty() {
            return out;
        }
        let mut sum = 0.0;
        for q in questions {
            let p = self.sentiment.polarity(&view.text(q));
            sum += p;
            if p > self.sentiment_threshold {
                out.positive += 1;
            } else if p < -self.sentiment_threshold {
                out.negative += 1;
            } else {
                out.neutral += 1;
            }
        }
        out.mean_polarity = round4(sum / questions.len() as f64);
        out
    }

    pub fn quality(&self, questions: &[Question]) -> ContentQuality {
        if questions.is_empty() {
            return ContentQuality::default();
        }
        let n = questions.len() as f64;

        let mut complete = 0usize;
        let mut clear = 0usize;
        let mut deep = 0usize;
        let mut tokens_total = 0usize;
        let mut technical = 0usize;
        let mut words_total = 0usize;
        let mut lengths = (0usize, 0usize, 0usize, 0usize);

        for q in questions {
            let summary_words = text::word_count(&q.summary);
            let title_words = text::word_count(&q.title);
            if summary_words > self.quality.summary_min_words {
                complete += 1;
            }
            if !q.title.trim().is_empty() && summary_words >= self.quality.clarity_min_summary_words {
                clear += 1;
            }

            let combined = q.combined_text();
            let lower = combined.to_lowercase();
            if self.quality.advanced_terms.iter().any(|t| {
                let t = t.trim().to_lowercase();
                !t.is_empty() && lower.contains(&t)
            }) {
                deep += 1;
            }
            for tok in text::raw_tokens(&combined) {
                tokens_total += 1;
                if self.is_technical(tok) {
                    technical += 1;
                }
            }

            words_total += title_words + summary_words;
            lengths.0 += q.title.chars().count();
            lengths.1 += title_words;
            lengths.2 += q.summary.chars().count();
            lengths.3 += summary_words;
        }

        let ratio = if tokens_total == 0 {
            0.0
        } else {
            technical as f64 / tokens_total as f64
        };

        ContentQuality {
            summary_completeness: round2(complete as f64 / n * 100.0),
            technical_word_ratio: round4(ratio),
            technical_term_count: technical,
            question_clarity: round4(clear as f64 / n),
            technical_depth: round2(deep as f64 / n * 100.0),
            avg_words_per_question: round2(words_total as f64 / n),
            length_stats: LengthStats {
                avg_title_chars: round2(lengths.0 as f64 / n),
                avg_title_words: round2(lengths.1 as f64 / n),
                avg_summary_chars: round2(lengths.2 as f64 / n),
                avg_summary_words: round2(lengths.3 as f64 / n),
            },
        }
    }

    /// Listed technical term, language-ish name (`c++`, `c#`) or code-like token.
    fn is_technical(&self, raw: &str) -> bool {
        let lower = raw.to_lowercase();
        self.technical_terms.contains(&text::lemmatize(&lower))
            || lower.contains(|c| c == '+' || c == '#')
            || text::looks_like_code(raw)
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}
