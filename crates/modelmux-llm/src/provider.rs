//! Provider contract and descriptors
//!
//! [`ChatProvider`] is the uniform collaborator contract every backend
//! implements. [`ProviderDescriptor`] is the immutable, config-loaded
//! description of one backend that the router ranks and the pool dispatches to.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Routing priority declared by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityMode {
    /// Cheapest eligible provider
    Cost,
    /// Fastest eligible provider
    Latency,
    /// No strong preference
    #[default]
    Balanced,
}

impl PriorityMode {
    /// All modes, in declaration order
    pub const ALL: [PriorityMode; 3] = [Self::Cost, Self::Latency, Self::Balanced];

    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cost => "cost",
            Self::Latency => "latency",
            Self::Balanced => "balanced",
        }
    }
}

impl fmt::Display for PriorityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriorityMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cost" => Ok(Self::Cost),
            "latency" => Ok(Self::Latency),
            "balanced" => Ok(Self::Balanced),
            other => Err(Error::NotConfigured(format!("unknown priority mode: {other}"))),
        }
    }
}

/// Role a provider plays in the fleet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderRole {
    /// First-line provider
    #[default]
    Primary,
    /// Only expected to serve after a primary fails
    Fallback,
}

fn all_modes() -> Vec<PriorityMode> {
    PriorityMode::ALL.to_vec()
}

/// Immutable description of one backend provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Unique provider name
    pub name: String,
    /// Base URL of the OpenAI-compatible API
    pub endpoint: String,
    /// Name of the environment variable holding the API key
    #[serde(default)]
    pub auth_credential_ref: Option<String>,
    /// Model identifier sent with each request
    pub model_id: String,
    /// Configured latency estimate, used until real observations exist
    pub expected_latency_ms: u64,
    /// USD per 1,000 tokens
    #[serde(default)]
    pub cost_per_unit: f64,
    /// Lower ranks win latency ties
    #[serde(default)]
    pub priority_rank: u32,
    /// Primary or fallback
    #[serde(default)]
    pub role: ProviderRole,
    /// Priority modes this provider is eligible for
    #[serde(default = "all_modes")]
    pub modes: Vec<PriorityMode>,
    /// Calls allowed per sliding minute, unlimited when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_per_minute: Option<u32>,
    /// Calls allowed in flight at once, unlimited when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_requests: Option<u32>,
}

impl ProviderDescriptor {
    /// Create a descriptor eligible for every mode
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        model_id: impl Into<String>,
        expected_latency_ms: u64,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            auth_credential_ref: None,
            model_id: model_id.into(),
            expected_latency_ms,
            cost_per_unit: 0.0,
            priority_rank: 0,
            role: ProviderRole::Primary,
            modes: all_modes(),
            rate_limit_per_minute: None,
            max_concurrent_requests: None,
        }
    }

    /// Set the credential environment variable
    #[must_use]
    pub fn with_credential_ref(mut self, env_var: impl Into<String>) -> Self {
        self.auth_credential_ref = Some(env_var.into());
        self
    }

    /// Set the cost per 1,000 tokens
    #[must_use]
    pub fn with_cost_per_unit(mut self, cost: f64) -> Self {
        self.cost_per_unit = cost;
        self
    }

    /// Set the priority rank
    #[must_use]
    pub fn with_priority_rank(mut self, rank: u32) -> Self {
        self.priority_rank = rank;
        self
    }

    /// Set the role
    #[must_use]
    pub fn with_role(mut self, role: ProviderRole) -> Self {
        self.role = role;
        self
    }

    /// Restrict eligibility to the given modes
    #[must_use]
    pub fn with_modes(mut self, modes: Vec<PriorityMode>) -> Self {
        self.modes = modes;
        self
    }

    /// Limit calls per minute and calls in flight
    #[must_use]
    pub fn with_limits(mut self, per_minute: Option<u32>, max_concurrent: Option<u32>) -> Self {
        self.rate_limit_per_minute = per_minute;
        self.max_concurrent_requests = max_concurrent;
        self
    }

    /// Whether this provider may serve requests in `mode`
    #[must_use]
    pub fn supports_mode(&self, mode: PriorityMode) -> bool {
        self.modes.contains(&mode)
    }

    /// Cost in USD of `tokens` tokens on this provider
    #[must_use]
    pub fn cost_for_tokens(&self, tokens: u32) -> f64 {
        f64::from(tokens) / 1000.0 * self.cost_per_unit
    }

    /// Resolve the API key from the environment
    ///
    /// Returns `Ok(None)` when the descriptor names no credential (local
    /// backends such as Ollama).
    pub fn resolve_api_key(&self) -> Result<Option<String>> {
        match &self.auth_credential_ref {
            None => Ok(None),
            Some(var) => std::env::var(var).map(Some).map_err(|_| {
                Error::NotConfigured(format!("{var} not set for provider {}", self.name))
            }),
        }
    }
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub prompt_tokens: u32,
    /// Completion tokens
    pub completion_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
}

/// A completed provider response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// Generated text
    pub content: String,
    /// Token usage, when the provider reports it
    pub usage: Option<TokenUsage>,
    /// Model that actually served the request
    pub model: String,
}

/// Uniform collaborator contract for a backend language-model provider
#[async_trait::async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name
    fn name(&self) -> &str;

    /// Send a prompt and wait for the complete response
    async fn send(&self, prompt: &str, max_tokens: u32) -> Result<Completion>;
}
