//! Keyword overlap scoring for the in-memory store.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static RE_WORD: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[\p{L}\p{N}_]+").ok());

/// Words too common to say anything about relevance.
static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "the", "and", "for", "are", "was", "with", "that", "this", "you", "your", "what", "how",
        "why", "when", "who", "can", "does", "not", "but", "from", "have", "has", "its", "into",
    ]
    .into_iter()
    .collect()
});

/// Lowercased content words of `text`, deduplicated.
pub fn keywords(text: &str) -> HashSet<String> {
    let Some(re) = RE_WORD.as_ref() else {
        return HashSet::new();
    };
    re.find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(w.as_str()))
        .collect()
}

/// Fraction of query keywords present in the candidate (0.0–1.0).
pub fn overlap_score(query: &HashSet<String>, candidate: &HashSet<String>) -> f32 {
    if query.is_empty() {
        return 0.0;
    }
    let matches = query.iter().filter(|w| candidate.contains(*w)).count();
    matches as f32 / query.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_filters_short_and_stopwords() {
        let words = keywords("What is the Rust borrow checker? It is strict.");
        assert!(words.contains("rust"));
        assert!(words.contains("borrow"));
        assert!(words.contains("strict"));
        assert!(!words.contains("what"));
        assert!(!words.contains("is"));
    }

    #[test]
    fn test_overlap_score() {
        let q = keywords("rust borrow checker");
        let c = keywords("the borrow checker rejects aliasing");
        let score = overlap_score(&q, &c);
        assert!((score - 2.0 / 3.0).abs() < 0.001);
        assert_eq!(overlap_score(&HashSet::new(), &c), 0.0);
    }
}
