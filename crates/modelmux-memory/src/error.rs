//! Error types for the context store.

/// Errors that can occur talking to a context store.
///
/// The coordinator never surfaces these to callers; a failed read means no
/// augmentation and a failed write is logged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level failure reaching the store
    #[error("context store unavailable: {0}")]
    Unavailable(String),

    /// The store answered with a non-2xx status
    #[error("context store returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        message: String,
    },

    /// Serialization / deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed store response
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Convenience Result type.
pub type Result<T> = std::result::Result<T, Error>;
