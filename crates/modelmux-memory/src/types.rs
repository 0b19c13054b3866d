//! Core data types exchanged with a context store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A piece of retrieved context, ordered by relevance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnippet {
    /// Opaque record id in the store
    pub id: String,
    /// Text to prepend to the prompt
    pub text: String,
    /// Relevance score (higher is better, store-defined scale)
    #[serde(default)]
    pub score: f32,
}

/// A completed request/response pair submitted for future retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    /// Request id assigned by the coordinator
    pub request_id: String,
    /// User message as received (before augmentation)
    pub message: String,
    /// Provider response content
    pub response: String,
    /// Provider that produced the response
    pub provider: String,
    /// When the exchange completed
    pub created_at: DateTime<Utc>,
}

impl Exchange {
    /// Create an exchange stamped with the current time
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        message: impl Into<String>,
        response: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            message: message.into(),
            response: response.into(),
            provider: provider.into(),
            created_at: Utc::now(),
        }
    }
}

/// A stored exchange, as kept by [`InMemoryContextStore`](crate::InMemoryContextStore).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRecord {
    /// Unique record id (UUID)
    pub id: String,
    /// The stored exchange
    pub exchange: Exchange,
    /// When the record was written
    pub stored_at: DateTime<Utc>,
}

impl ContextRecord {
    /// Snippet text for this record
    #[must_use]
    pub fn snippet_text(&self) -> String {
        format!("Q: {}\nA: {}", self.exchange.message, self.exchange.response)
    }
}
