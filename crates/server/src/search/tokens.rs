//! Text query cleaning and tokenization.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// Words the query language reserves for operators. They never become terms.
pub const RESERVED_WORDS: [&str; 4] = ["AND", "OR", "NOT", "INCLUDES"];

/// English stopwords. PostgreSQL's `english` text search configuration
/// discards these, so they never become terms for any backend.
pub const STOPWORDS: [&str; 127] = [
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "did", "do", "does", "doing", "don", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just",
    "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "s", "same", "she",
    "should", "so", "some", "such", "t", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "you", "your", "yours", "yourself",
    "yourselves",
];

/// Runs of characters that are neither letters, digits nor whitespace.
///
/// # Panics
///
/// Panics if the hard-coded regex literal is invalid (impossible in practice).
#[allow(clippy::expect_used)]
static SPECIAL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{Alphabetic}\p{Nd}\s]+").expect("valid regex literal"));

/// Replace special characters with spaces and collapse whitespace.
pub fn clean(query: &str) -> String {
    SPECIAL_CHARS
        .replace_all(query, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn is_reserved(word: &str) -> bool {
    RESERVED_WORDS.contains(&word)
}

/// Whether a lowercase word is a stopword.
pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Split a text query into lowercase search terms.
pub fn tokenize(query: &str) -> Vec<String> {
    let cleaned = clean(query);
    let mut terms = Vec::new();
    for word in cleaned.split_whitespace() {
        if is_reserved(word) {
            debug!(operator = %word, "ignoring reserved word in text query");
            continue;
        }
        let term = word.to_lowercase();
        if !is_stopword(&term) {
            terms.push(term);
        }
    }
    terms
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn clean_strips_special_characters() {
        assert_eq!(clean("box[12] (cold)"), "box 12 cold");
        assert_eq!(clean("a.b,c|d$e^f"), "a b c d e f");
        assert_eq!(clean("  spaced   out  "), "spaced out");
        assert_eq!(clean("***"), "");
    }

    #[test]
    fn clean_keeps_unicode_letters() {
        assert_eq!(clean("Zellkultur-Röhrchen"), "Zellkultur Röhrchen");
    }

    #[test]
    fn tokenize_drops_reserved_words() {
        assert_eq!(tokenize("Box AND Plate"), vec!["box", "plate"]);
        assert_eq!(tokenize("NOT INCLUDES OR"), Vec::<String>::new());
    }

    #[test]
    fn stopwords_are_dropped() {
        assert_eq!(tokenize("salt and pepper"), vec!["salt", "pepper"]);
        assert_eq!(tokenize("The Box of Tubes"), vec!["box", "tubes"]);
        assert!(tokenize("of the").is_empty());
    }

    #[test]
    fn tsquery_syntax_cannot_survive() {
        assert_eq!(tokenize("x:* & !b | c<->d"), vec!["x", "b", "c", "d"]);
    }
}
