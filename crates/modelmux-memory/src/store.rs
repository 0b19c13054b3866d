//! The context store collaborator contract.

use crate::error::Result;
use crate::types::{ContextSnippet, Exchange};

/// Query/insert contract for a memory or RAG backend.
///
/// Implementations must be safe to share across request tasks.
#[async_trait::async_trait]
pub trait ContextStore: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Return at most `top_k` snippets relevant to `text`, best first.
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<ContextSnippet>>;

    /// Persist an exchange and return its record id.
    async fn store(&self, exchange: Exchange) -> Result<String>;
}
