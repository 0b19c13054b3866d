//! Error types for modelmux-llm

use thiserror::Error;

/// Provider error type
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Provider not configured (missing credential, unknown name)
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// Non-2xx response from the provider
    #[error("api error: {0}")]
    Api(String),

    /// Rate limit exceeded
    #[error("rate limit exceeded")]
    RateLimit,

    /// Response body could not be understood
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Connection-level failure
    #[error("network error: {0}")]
    Network(String),

    /// Timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),

    /// Client construction error
    #[error("provider error: {0}")]
    Provider(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
