//! Error types for modelmux-tools

use thiserror::Error;

/// Tool error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// No tool registered under this name
    #[error("tool not found: {name} (available: {})", available.join(", "))]
    NotFound {
        /// Requested name
        name: String,
        /// Sorted names of the registered tools
        available: Vec<String>,
    },

    /// The handler returned an error or panicked
    #[error("tool {name} failed: {message}")]
    ExecutionFailed {
        /// Tool name
        name: String,
        /// Original handler message
        message: String,
    },

    /// Arguments rejected before the handler ran
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Raised by a handler; the registry reports it as [`Error::ExecutionFailed`]
    #[error("{0}")]
    Execution(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
