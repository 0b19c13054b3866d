//! Inbound chat requests and the responses returned for them

use crate::error::{Error, Result};
use modelmux_llm::PriorityMode;
use serde::{Deserialize, Serialize};

/// Default `max_tokens` when the caller omits it
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Default upper bound accepted for `max_tokens`
pub const DEFAULT_MAX_TOKENS_LIMIT: u32 = 32_768;

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

/// A chat request as received from a caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// User message
    pub message: String,
    /// Routing priority
    #[serde(default)]
    pub priority_mode: PriorityMode,
    /// Completion token cap
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Preferred model family (matched against provider model ids)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_hint: Option<String>,
}

impl ChatRequest {
    /// Create a balanced-mode request with default `max_tokens`
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            priority_mode: PriorityMode::default(),
            max_tokens: DEFAULT_MAX_TOKENS,
            model_hint: None,
        }
    }

    /// Set the priority mode
    #[must_use]
    pub fn with_mode(mut self, mode: PriorityMode) -> Self {
        self.priority_mode = mode;
        self
    }

    /// Set `max_tokens`
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the model hint
    #[must_use]
    pub fn with_model_hint(mut self, hint: impl Into<String>) -> Self {
        self.model_hint = Some(hint.into());
        self
    }

    /// Check the request against the coordinator's limits
    pub fn validate(&self, max_tokens_limit: u32) -> Result<()> {
        if self.message.trim().is_empty() {
            return Err(Error::InvalidRequest("message must not be empty".to_string()));
        }
        if self.max_tokens == 0 || self.max_tokens > max_tokens_limit {
            return Err(Error::InvalidRequest(format!(
                "max_tokens must be between 1 and {max_tokens_limit}, got {}",
                self.max_tokens
            )));
        }
        Ok(())
    }
}

/// The coordinator's answer to a [`ChatRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Completion text
    pub content: String,
    /// Provider that produced the content
    pub provider: String,
    /// End-to-end latency of this request
    pub latency_ms: u64,
    /// Whether the content came from the response cache
    pub cache_hit: bool,
    /// Number of context snippets prepended to the prompt
    pub context_snippets: usize,
    /// Request id, as logged
    pub request_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_json() {
        let req: ChatRequest = serde_json::from_str(r#"{"message":"hello"}"#).unwrap();
        assert_eq!(req.priority_mode, PriorityMode::Balanced);
        assert_eq!(req.max_tokens, DEFAULT_MAX_TOKENS);
        assert!(req.model_hint.is_none());
    }

    #[test]
    fn test_validate() {
        assert!(ChatRequest::new("hi").validate(DEFAULT_MAX_TOKENS_LIMIT).is_ok());
        assert!(matches!(
            ChatRequest::new("   ").validate(DEFAULT_MAX_TOKENS_LIMIT),
            Err(Error::InvalidRequest(_))
        ));
        assert!(ChatRequest::new("hi").with_max_tokens(0).validate(100).is_err());
        assert!(ChatRequest::new("hi").with_max_tokens(101).validate(100).is_err());
        assert!(ChatRequest::new("hi").with_max_tokens(100).validate(100).is_ok());
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let parsed: std::result::Result<ChatRequest, _> =
            serde_json::from_str(r#"{"message":"hi","priority_mode":"fastest"}"#);
        assert!(parsed.is_err());
    }
}
