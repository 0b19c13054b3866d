//! Coordinator configuration
//!
//! Every section falls back to serde defaults so a partial file is valid.

use crate::error::{Error, Result};
use crate::request::DEFAULT_MAX_TOKENS_LIMIT;
use crate::rules::{default_rules, RuleConfig};
use modelmux_llm::pool::{DEFAULT_MIN_TIMEOUT_MS, DEFAULT_SAFETY_FACTOR};
use modelmux_llm::ProviderDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Longest accepted cache TTL (30 days)
pub const MAX_CACHE_TTL_SECS: u64 = 30 * 24 * 3600;

/// Largest accepted deadline multiplier
pub const MAX_SAFETY_FACTOR: f64 = 100.0;

/// Top-level coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Backend providers
    #[serde(default)]
    pub providers: Vec<ProviderDescriptor>,
    /// Response cache
    #[serde(default)]
    pub cache: CacheConfig,
    /// Routing policy
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Context augmentation
    #[serde(default)]
    pub context: ContextConfig,
    /// Largest `max_tokens` a request may ask for
    #[serde(default = "default_max_tokens_limit")]
    pub max_tokens_limit: u32,
    /// Seconds to wait for in-flight requests on shutdown
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            cache: CacheConfig::default(),
            routing: RoutingConfig::default(),
            context: ContextConfig::default(),
            max_tokens_limit: default_max_tokens_limit(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

fn default_max_tokens_limit() -> u32 {
    DEFAULT_MAX_TOKENS_LIMIT
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

/// Response cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Time-to-live for new entries
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
    /// Entry bound before LRU eviction
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Background purge interval; 0 disables the sweeper
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    crate::cache::DEFAULT_TTL_SECS
}

fn default_max_entries() -> usize {
    crate::cache::DEFAULT_MAX_ENTRIES
}

fn default_sweep_interval_secs() -> u64 {
    60
}

/// Routing policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Extra attempts after the first failure
    #[serde(default = "default_max_fallbacks")]
    pub max_fallbacks: usize,
    /// Multiplier on expected latency for provider deadlines
    #[serde(default = "default_safety_factor")]
    pub safety_factor: f64,
    /// Deadline floor in milliseconds
    #[serde(default = "default_min_timeout_ms")]
    pub min_timeout_ms: u64,
    /// Provider whose price is the savings reference
    #[serde(default)]
    pub baseline_provider: Option<String>,
    /// Ordered rule table
    #[serde(default = "default_rules")]
    pub rules: Vec<RuleConfig>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            max_fallbacks: default_max_fallbacks(),
            safety_factor: default_safety_factor(),
            min_timeout_ms: default_min_timeout_ms(),
            baseline_provider: None,
            rules: default_rules(),
        }
    }
}

fn default_max_fallbacks() -> usize {
    1
}

fn default_safety_factor() -> f64 {
    DEFAULT_SAFETY_FACTOR
}

fn default_min_timeout_ms() -> u64 {
    DEFAULT_MIN_TIMEOUT_MS
}

/// Which context store backs the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextBackend {
    /// No augmentation, no write-back
    None,
    /// In-process store
    #[default]
    Memory,
    /// Remote memory service
    Http,
}

/// Context augmentation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Store implementation
    #[serde(default)]
    pub backend: ContextBackend,
    /// Base URL for the HTTP backend
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Snippets requested per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Query deadline in milliseconds
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    /// Token budget for prepended context
    #[serde(default = "default_budget_tokens")]
    pub budget_tokens: usize,
    /// Write-back queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Record bound for the in-memory backend
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            backend: ContextBackend::default(),
            endpoint: None,
            top_k: default_top_k(),
            query_timeout_ms: default_query_timeout_ms(),
            budget_tokens: default_budget_tokens(),
            queue_capacity: default_queue_capacity(),
            memory_capacity: default_memory_capacity(),
        }
    }
}

fn default_top_k() -> usize {
    3
}

fn default_query_timeout_ms() -> u64 {
    300
}

fn default_budget_tokens() -> usize {
    512
}

fn default_queue_capacity() -> usize {
    256
}

fn default_memory_capacity() -> usize {
    modelmux_memory::memory::DEFAULT_CAPACITY
}

impl CoordinatorConfig {
    /// Check cross-field constraints
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                return Err(Error::Configuration("provider name must not be empty".to_string()));
            }
            if !seen.insert(provider.name.as_str()) {
                return Err(Error::Configuration(format!(
                    "duplicate provider name: {}",
                    provider.name
                )));
            }
            if provider.modes.is_empty() {
                return Err(Error::Configuration(format!(
                    "provider {} is not eligible for any mode",
                    provider.name
                )));
            }
            if provider.rate_limit_per_minute == Some(0) || provider.max_concurrent_requests == Some(0) {
                return Err(Error::Configuration(format!(
                    "provider {} has a zero rate or concurrency limit",
                    provider.name
                )));
            }
            if !provider.cost_per_unit.is_finite() || provider.cost_per_unit < 0.0 {
                return Err(Error::Configuration(format!(
                    "provider {} has an invalid cost_per_unit",
                    provider.name
                )));
            }
        }

        if let Some(baseline) = &self.routing.baseline_provider {
            if !seen.contains(baseline.as_str()) {
                return Err(Error::Configuration(format!(
                    "baseline provider {baseline} is not configured"
                )));
            }
        }

        if self.max_tokens_limit == 0 {
            return Err(Error::Configuration("max_tokens_limit must be at least 1".to_string()));
        }
        if !(1.0..=MAX_SAFETY_FACTOR).contains(&self.routing.safety_factor) {
            return Err(Error::Configuration(format!(
                "routing.safety_factor must be between 1.0 and {MAX_SAFETY_FACTOR}"
            )));
        }
        if self.cache.default_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(Error::Configuration(format!(
                "cache.default_ttl_secs must be at most {MAX_CACHE_TTL_SECS}"
            )));
        }
        if self.context.backend == ContextBackend::Http && self.context.endpoint.is_none() {
            return Err(Error::Configuration(
                "context.endpoint is required for the http backend".to_string(),
            ));
        }
        Ok(())
    }
}
