//! Common utilities for provider clients
//!
//! Helpers shared by the HTTP clients and the pool for keeping secrets
//! out of logs and error messages.

/// Minimum key length to display partial key
const MIN_KEY_LENGTH_FOR_PARTIAL_DISPLAY: usize = 8;

/// Number of characters to show at start/end of masked key
const KEY_MASK_VISIBLE_CHARS: usize = 4;

/// Longest provider error body kept in an error message
const MAX_ERROR_LEN: usize = 300;

/// Sensitive patterns to filter from error messages
const SENSITIVE_PATTERNS: &[&str] = &[
    "api_key",
    "api-key",
    "apikey",
    "authorization",
    "bearer",
    "secret",
    "password",
    "credential",
];

/// Mask API key for safe display in logs
///
/// Shows first 4 and last 4 characters for keys longer than 8 characters,
/// otherwise shows "****" to prevent exposure of short keys.
///
/// # Examples
/// ```
/// use modelmux_llm::util::mask_api_key;
/// assert_eq!(mask_api_key("sk-1234567890abcdef"), "sk-1...cdef");
/// assert_eq!(mask_api_key("short"), "****");
/// ```
#[must_use]
pub fn mask_api_key(key: &str) -> String {
    if key.len() <= MIN_KEY_LENGTH_FOR_PARTIAL_DISPLAY || !key.is_ascii() {
        return "****".to_string();
    }
    format!(
        "{}...{}",
        &key[..KEY_MASK_VISIBLE_CHARS],
        &key[key.len() - KEY_MASK_VISIBLE_CHARS..]
    )
}

/// Truncate a string to at most `max_bytes`, never splitting a UTF-8 character
#[must_use]
pub fn truncate_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Sanitize a provider error body before it is logged or surfaced
///
/// Bodies mentioning credentials are replaced with a generic message and
/// long bodies are truncated.
///
/// # Examples
/// ```
/// use modelmux_llm::util::sanitize_provider_error;
/// assert_eq!(
///     sanitize_provider_error("deepseek", "Invalid api_key provided"),
///     "deepseek authentication error, check the configured credential"
/// );
/// assert_eq!(sanitize_provider_error("deepseek", "model overloaded"), "model overloaded");
/// ```
#[must_use]
pub fn sanitize_provider_error(provider: &str, error: &str) -> String {
    let lower = error.to_lowercase();

    if SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p))
        || lower.contains("unauthorized")
        || lower.contains("invalid key")
    {
        return format!("{provider} authentication error, check the configured credential");
    }

    if error.len() > MAX_ERROR_LEN {
        format!("{}...(truncated)", truncate_safe(error, MAX_ERROR_LEN))
    } else {
        error.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_api_key_long() {
        let key = "sk-1234567890abcdefghij";
        let masked = mask_api_key(key);
        assert_eq!(masked, "sk-1...ghij");
        assert!(!masked.contains("567890"));
    }

    #[test]
    fn test_mask_api_key_short() {
        assert_eq!(mask_api_key("short"), "****");
        assert_eq!(mask_api_key("12345678"), "****");
        assert_eq!(mask_api_key(""), "****");
    }

    #[test]
    fn test_truncate_safe_respects_char_boundary() {
        let s = "héllo";
        // 'é' is two bytes starting at index 1
        assert_eq!(truncate_safe(s, 2), "h");
        assert_eq!(truncate_safe(s, 3), "hé");
        assert_eq!(truncate_safe(s, 100), s);
    }

    #[test]
    fn test_sanitize_bearer() {
        let sanitized = sanitize_provider_error("qwen", "Bearer token expired");
        assert!(sanitized.contains("authentication error"));
        assert!(!sanitized.contains("token expired"));
    }

    #[test]
    fn test_sanitize_truncates_long_body() {
        let body = "x".repeat(1000);
        let sanitized = sanitize_provider_error("groq", &body);
        assert!(sanitized.ends_with("...(truncated)"));
        assert!(sanitized.len() < 400);
    }
}
