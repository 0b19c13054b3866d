//! HTTP context store client.
//!
//! Talks to an external memory service exposing `POST {endpoint}/query`
//! and `POST {endpoint}/store`.

use crate::error::{Error, Result};
use crate::store::ContextStore;
use crate::types::{ContextSnippet, Exchange};
use modelmux_llm::util::truncate_safe;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Longest error body kept in an error message
const MAX_ERROR_BODY: usize = 200;

#[derive(Serialize)]
struct QueryRequest<'a> {
    text: &'a str,
    top_k: usize,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    snippets: Vec<ContextSnippet>,
}

#[derive(Deserialize)]
struct StoreResponse {
    id: String,
}

/// Context store backed by a remote memory service.
pub struct HttpContextStore {
    client: Client,
    endpoint: String,
}

impl HttpContextStore {
    /// Create a client for the service at `endpoint`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Unavailable(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    /// Base URL of the service.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post<B: Serialize + ?Sized, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let response = self
            .client
            .post(format!("{}/{path}", self.endpoint))
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                message: error_body(&body),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn error_body(body: &str) -> String {
    truncate_safe(body, MAX_ERROR_BODY).to_string()
}

#[async_trait::async_trait]
impl ContextStore for HttpContextStore {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, text), fields(endpoint = %self.endpoint, top_k))]
    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<ContextSnippet>> {
        let response: QueryResponse = self.post("query", &QueryRequest { text, top_k }).await?;
        debug!(results = response.snippets.len(), "context query answered");
        let mut snippets = response.snippets;
        snippets.truncate(top_k);
        Ok(snippets)
    }

    #[instrument(skip(self, exchange), fields(endpoint = %self.endpoint, request_id = %exchange.request_id))]
    async fn store(&self, exchange: Exchange) -> Result<String> {
        let response: StoreResponse = self.post("store", &exchange).await?;
        Ok(response.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trimmed() {
        let store = HttpContextStore::new("http://localhost:8090/", Duration::from_secs(1)).unwrap();
        assert_eq!(store.endpoint(), "http://localhost:8090");
    }

    #[test]
    fn test_query_response_tolerates_missing_fields() {
        let parsed: QueryResponse =
            serde_json::from_str(r#"{"snippets":[{"id":"1","text":"hello"}]}"#).unwrap();
        assert_eq!(parsed.snippets[0].score, 0.0);

        let empty: QueryResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.snippets.is_empty());
    }

    #[test]
    fn test_error_body_truncated_on_char_boundary() {
        let body = "é".repeat(MAX_ERROR_BODY);
        let kept = error_body(&body);
        assert!(kept.len() <= MAX_ERROR_BODY);
        assert_eq!(kept.chars().count(), MAX_ERROR_BODY / 2);
        assert_eq!(error_body("short"), "short");
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let store = HttpContextStore::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = store.query("hello", 3).await.unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
    }
}
