//! Token counting and budget truncation
//!
//! Uses tiktoken's cl100k_base encoding, which is close enough for every
//! OpenAI-compatible backend the pool talks to.

use std::sync::LazyLock;
use tiktoken_rs::{cl100k_base, CoreBPE};
use tracing::warn;

/// Global tokenizer instance (initialized once, thread-safe)
static TOKENIZER: LazyLock<Option<CoreBPE>> = LazyLock::new(|| match cl100k_base() {
    Ok(bpe) => Some(bpe),
    Err(e) => {
        warn!(error = %e, "cl100k_base tokenizer unavailable, falling back to char estimate");
        None
    }
});

/// Rough chars-per-token ratio used when the tokenizer is unavailable
const CHARS_PER_TOKEN: usize = 4;

/// Token counter
///
/// Zero-sized wrapper around the global tokenizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCounter;

impl TokenCounter {
    /// Create a new token counter
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Count tokens in a string
    #[must_use]
    pub fn count_tokens(&self, text: &str) -> usize {
        match TOKENIZER.as_ref() {
            Some(bpe) => bpe.encode_with_special_tokens(text).len(),
            None => text.chars().count().div_ceil(CHARS_PER_TOKEN),
        }
    }

    /// Truncate `text` to at most `max_tokens` tokens
    ///
    /// Returns the text unchanged when it already fits.
    #[must_use]
    pub fn truncate_to_tokens(&self, text: &str, max_tokens: usize) -> String {
        if max_tokens == 0 {
            return String::new();
        }

        let Some(bpe) = TOKENIZER.as_ref() else {
            let max_chars = max_tokens * CHARS_PER_TOKEN;
            return text.chars().take(max_chars).collect();
        };

        let tokens = bpe.encode_with_special_tokens(text);
        if tokens.len() <= max_tokens {
            return text.to_string();
        }

        // A cut can land inside a multi-byte character; back off until it decodes.
        let mut end = max_tokens;
        while end > 0 {
            if let Ok(decoded) = bpe.decode(tokens[..end].to_vec()) {
                return decoded;
            }
            end -= 1;
        }
        String::new()
    }
}

/// Global token counter instance for convenience
pub static TOKEN_COUNTER: TokenCounter = TokenCounter::new();

/// Convenience function to count tokens in text
#[must_use]
pub fn count_tokens(text: &str) -> usize {
    TOKEN_COUNTER.count_tokens(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_counter_basic() {
        let counter = TokenCounter::new();

        let tokens = counter.count_tokens("Hello, world!");
        assert!(tokens > 0);
        assert!(tokens < 10);

        assert_eq!(counter.count_tokens(""), 0);
    }

    #[test]
    fn test_truncate_fits() {
        let counter = TokenCounter::new();
        assert_eq!(counter.truncate_to_tokens("short text", 100), "short text");
    }

    #[test]
    fn test_truncate_over_budget() {
        let counter = TokenCounter::new();
        let long = "word ".repeat(200);
        let truncated = counter.truncate_to_tokens(&long, 10);
        assert!(counter.count_tokens(&truncated) <= 10);
        assert!(long.starts_with(&truncated));
    }

    #[test]
    fn test_truncate_zero_budget() {
        assert_eq!(TOKEN_COUNTER.truncate_to_tokens("anything", 0), "");
    }
}
