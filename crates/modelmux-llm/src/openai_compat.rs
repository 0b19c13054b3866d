//! OpenAI-compatible HTTP provider
//!
//! Every backend the pool talks to (Groq, Moonshot, DeepSeek, OpenRouter,
//! a local Ollama) exposes `POST {endpoint}/chat/completions`, so one client
//! covers the whole fleet. The per-call deadline is owned by the pool; the
//! client-level timeout here is only a backstop.

use crate::error::{Error, Result};
use crate::provider::{ChatProvider, Completion, ProviderDescriptor, TokenUsage};
use crate::util::{mask_api_key, sanitize_provider_error};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

/// Backstop timeout for a single HTTP exchange
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// Configuration for one OpenAI-compatible backend
#[derive(Clone)]
pub struct OpenAiCompatConfig {
    /// Provider name used in logs and errors
    pub name: String,
    /// API key, absent for unauthenticated local backends
    pub api_key: Option<String>,
    /// Base URL, without the trailing `/chat/completions`
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// HTTP client timeout
    pub timeout: Duration,
}

impl fmt::Debug for OpenAiCompatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiCompatConfig")
            .field("name", &self.name)
            .field("api_key", &self.api_key.as_deref().map(mask_api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenAiCompatConfig {
    /// Build a configuration from a descriptor, resolving its credential
    ///
    /// # Errors
    /// Returns [`Error::NotConfigured`] when the descriptor names a credential
    /// variable that is not set.
    pub fn from_descriptor(descriptor: &ProviderDescriptor) -> Result<Self> {
        Ok(Self {
            name: descriptor.name.clone(),
            api_key: descriptor.resolve_api_key()?,
            base_url: descriptor.endpoint.trim_end_matches('/').to_string(),
            model: descriptor.model_id.clone(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        })
    }

    /// Set the HTTP client timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// Provider client for any OpenAI-compatible chat completions API
pub struct OpenAiCompatProvider {
    client: Client,
    config: OpenAiCompatConfig,
}

impl OpenAiCompatProvider {
    /// Create a new provider
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: OpenAiCompatConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Provider(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create a provider straight from its descriptor
    pub fn from_descriptor(descriptor: &ProviderDescriptor) -> Result<Self> {
        Self::new(OpenAiCompatConfig::from_descriptor(descriptor)?)
    }

    fn map_transport_error(&self, e: &reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout(self.config.timeout.as_millis() as u64)
        } else {
            Error::Network(sanitize_provider_error(&self.config.name, &e.to_string()))
        }
    }
}

#[async_trait::async_trait]
impl ChatProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    #[instrument(skip(self, prompt), fields(provider = %self.config.name, model = %self.config.model))]
    async fn send(&self, prompt: &str, max_tokens: u32) -> Result<Completion> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
        };

        debug!("sending chat completion request");

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.map_transport_error(&e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimit);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!(
                "{status}: {}",
                sanitize_provider_error(&self.config.name, &error_text)
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidResponse("no choices in response".to_string()))?
            .message
            .content
            .unwrap_or_default();

        let usage = chat_response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(Completion {
            content,
            usage,
            model: chat_response
                .model
                .unwrap_or_else(|| self.config.model.clone()),
        })
    }
}
