//! Error types for modelmux-core

use modelmux_llm::{FailureKind, PriorityMode};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// One failed provider attempt within a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptFailure {
    /// Provider that was tried
    pub provider: String,
    /// Failure class
    pub kind: FailureKind,
    /// Sanitized failure message
    pub message: String,
    /// How long the attempt took
    pub latency_ms: u64,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}: {})", self.provider, self.kind, self.message)
    }
}

fn join_attempts(attempts: &[AttemptFailure]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// The request failed validation
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Every attempted provider failed
    #[error("all providers failed: {}", join_attempts(attempts))]
    AllProvidersFailed {
        /// Each attempted provider, in attempt order
        attempts: Vec<AttemptFailure>,
    },

    /// No configured provider is eligible for the request
    #[error("no provider is eligible for {0} mode")]
    NoEligibleProvider(PriorityMode),

    /// The caller cancelled the request
    #[error("request cancelled")]
    Cancelled,

    /// The coordinator is shutting down
    #[error("coordinator is shutting down")]
    ShuttingDown,

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Tool registry error
    #[error("tool error: {0}")]
    Tool(#[from] modelmux_tools::Error),

    /// Provider client error
    #[error("llm error: {0}")]
    Llm(#[from] modelmux_llm::Error),

    /// Context store error
    #[error("context store error: {0}")]
    Memory(#[from] modelmux_memory::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
