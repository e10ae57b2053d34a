// src/analyze/text.rs
//! Tokenizing, stop-word removal and light lemmatization shared by the analyzers.

use std::collections::HashSet;

use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;

/// Common English function words plus forum boilerplate.
pub const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "aren't", "as", "at", "be", "because", "been", "before", "being", "below", "between",
    "both", "but", "by", "can", "cannot", "could", "did", "didn't", "do", "does", "doesn't",
    "doing", "don't", "down", "during", "each", "etc", "even", "ever", "every", "few", "for",
    "from", "further", "get", "gets", "getting", "got", "had", "has", "have", "having", "he",
    "her", "here", "hers", "herself", "him", "himself", "his", "how", "however", "i", "i'm",
    "if", "in", "into", "is", "isn't", "it", "it's", "its", "itself", "just", "let", "like",
    "make", "me", "might", "more", "most", "much", "must", "my", "myself", "need", "no", "nor",
    "not", "now", "of", "off", "on", "once", "one", "only", "or", "other", "our", "ours",
    "ourselves", "out", "over", "own", "please", "same", "she", "should", "so", "some", "still",
    "such", "than", "thanks", "that", "the", "their", "theirs", "them", "themselves", "then",
    "there", "these", "they", "this", "those", "through", "to", "too", "try", "trying", "under",
    "until", "up", "us", "use", "used", "using", "very", "want", "was", "wasn't", "way", "we",
    "were", "what", "when", "where", "whether", "which", "while", "who", "whom", "why", "will",
    "with", "without", "won't", "would", "you", "your", "yours", "yourself", "yourselves",
];

static STOP_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| STOP_WORDS.iter().copied().collect());

/// Word-ish tokens; keeps `c++`, `c#`, `node.js`, `std::io`, `don't` in one piece.
fn token_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r"[\p{L}\p{N}_](?:[\p{L}\p{N}_'.:+#-]*[\p{L}\p{N}_+#])?")
            .expect("static token regex")
    })
}

/// Tokens with their original casing.
pub fn raw_tokens(text: &str) -> Vec<&str> {
    token_re().find_iter(text).map(|m| m.as_str()).collect()
}

/// Lowercased tokens in order of appearance.
pub fn tokens(text: &str) -> Vec<String> {
    raw_tokens(text).into_iter().map(str::to_lowercase).collect()
}

pub fn is_stop_word(tok: &str) -> bool {
    STOP_SET.contains(tok)
}

/// Tokens that carry meaning: no stop words, no bare numbers, no single characters.
pub fn terms(text: &str) -> Vec<String> {
    tokens(text)
        .into_iter()
        .filter(|t| t.chars().count() >= 2)
        .filter(|t| !is_stop_word(t))
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit() || c == '.'))
        .map(|t| lemmatize(&t))
        .collect()
}

/// Plural folding in the spirit of a noun lemmatizer: `queries` -> `query`,
/// `classes` -> `class`, `threads` -> `thread`. Anything else is returned as is.
pub fn lemmatize(word: &str) -> String {
    if word.len() <= 3 || !word.chars().all(|c| c.is_ascii_alphabetic()) {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix("ies") {
        if stem.len() >= 2 {
            return format!("{stem}y");
        }
    }
    for suffix in ["sses", "shes", "ches", "xes", "zes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with('s') && !["ss", "us", "is", "os"].iter().any(|s| word.ends_with(s)) {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

/// Whitespace word count, as used for summary thresholds.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Raw tokens that look like code rather than prose: `snake_case`, `camelCase`,
/// dotted members and `::` paths.
pub fn looks_like_code(tok: &str) -> bool {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^(?:[A-Za-z0-9]+_[A-Za-z0-9_]+|[a-z]+[A-Z][A-Za-z0-9]*|[A-Za-z_]\w*(?:\.|::)[A-Za-z_][\w.:]*)$")
            .expect("static code regex")
    });
    re.is_match(tok)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_keep_technical_names() {
        assert_eq!(
            tokens("Using C++ and C# with Node.js, don't panic!"),
            vec!["using", "c++", "and", "c#", "with", "node.js", "don't", "panic"]
        );
    }

    #[test]
    fn terms_drop_stop_words_and_numbers() {
        assert_eq!(terms("How do I sort 2 lists in Python?"), vec!["sort", "list", "python"]);
    }

    #[test]
    fn lemmatize_folds_plurals() {
        assert_eq!(lemmatize("queries"), "query");
        assert_eq!(lemmatize("classes"), "class");
        assert_eq!(lemmatize("threads"), "thread");
        assert_eq!(lemmatize("status"), "status");
        assert_eq!(lemmatize("class"), "class");
        assert_eq!(lemmatize("api"), "api");
    }

    #[test]
    fn code_heuristic() {
        assert!(looks_like_code("my_var"));
        assert!(looks_like_code("getElementById"));
        assert!(looks_like_code("os.path"));
        assert!(looks_like_code("std::mem"));
        assert!(!looks_like_code("python"));
        assert!(!looks_like_code("Python"));
    }
}
