//! Provider client pool
//!
//! Holds one client per configured provider and dispatches single calls with
//! a per-provider deadline. The pool never retries; fallback is the
//! coordinator's job. Every call reports its wall-clock latency, success or not.

use crate::error::{Error, Result};
use crate::limiter::{ProviderThrottle, Refusal};
use crate::openai_compat::OpenAiCompatProvider;
use crate::provider::{ChatProvider, Completion, ProviderDescriptor};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Default multiplier applied to a provider's expected latency
pub const DEFAULT_SAFETY_FACTOR: f64 = 3.0;

/// Default floor for any provider deadline
pub const DEFAULT_MIN_TIMEOUT_MS: u64 = 1_000;

/// Classification of a failed provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The deadline elapsed
    Timeout,
    /// The provider answered with a non-2xx status or a malformed body
    Error,
    /// Connection-level failure, or the provider is not usable
    Unreachable,
    /// The provider's call budget or concurrency cap is exhausted
    RateLimited,
}

impl FailureKind {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Error => "error",
            Self::Unreachable => "unreachable",
            Self::RateLimited => "rate_limited",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&Error> for FailureKind {
    fn from(err: &Error) -> Self {
        match err {
            Error::Timeout(_) => Self::Timeout,
            Error::Network(_) | Error::NotConfigured(_) => Self::Unreachable,
            Error::RateLimit => Self::RateLimited,
            Error::Api(_) | Error::InvalidResponse(_) | Error::Provider(_) => Self::Error,
        }
    }
}

/// A classified provider failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderFailure {
    /// Failure class
    pub kind: FailureKind,
    /// Sanitized message
    pub message: String,
}

impl From<Error> for ProviderFailure {
    fn from(err: Error) -> Self {
        Self {
            kind: FailureKind::from(&err),
            message: err.to_string(),
        }
    }
}

impl From<Refusal> for ProviderFailure {
    fn from(refusal: Refusal) -> Self {
        let message = match refusal {
            Refusal::RateLimited { retry_after } => {
                format!("call budget exhausted, retry in {}s", retry_after.as_secs())
            }
            Refusal::AtCapacity { max_concurrent } => {
                format!("{max_concurrent} calls already in flight")
            }
        };
        Self {
            kind: FailureKind::RateLimited,
            message,
        }
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Result of one dispatch through the pool
#[derive(Debug, Clone)]
pub struct CallOutcome {
    /// Provider the call went to
    pub provider: String,
    /// Wall-clock milliseconds from dispatch to completion or failure
    pub latency_ms: u64,
    /// Completion or classified failure
    pub result: std::result::Result<Completion, ProviderFailure>,
    /// The pool refused the call locally; nothing reached the provider
    pub throttled: bool,
}

impl CallOutcome {
    /// Whether the call succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

struct PoolEntry {
    descriptor: ProviderDescriptor,
    // None when the client could not be built (e.g. missing credential)
    client: Option<Arc<dyn ChatProvider>>,
    throttle: ProviderThrottle,
}

impl PoolEntry {
    fn new(descriptor: ProviderDescriptor, client: Option<Arc<dyn ChatProvider>>) -> Self {
        let throttle = ProviderThrottle::new(
            descriptor.rate_limit_per_minute,
            descriptor.max_concurrent_requests,
        );
        Self {
            descriptor,
            client,
            throttle,
        }
    }
}

/// One client per provider descriptor
pub struct ProviderPool {
    entries: HashMap<String, PoolEntry>,
    safety_factor: f64,
    min_timeout: Duration,
}

impl Default for ProviderPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderPool {
    /// Create an empty pool with default deadline settings
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            safety_factor: DEFAULT_SAFETY_FACTOR,
            min_timeout: Duration::from_millis(DEFAULT_MIN_TIMEOUT_MS),
        }
    }

    /// Set the multiplier applied to expected latency
    #[must_use]
    pub fn with_safety_factor(mut self, factor: f64) -> Self {
        self.safety_factor = factor.max(1.0);
        self
    }

    /// Set the deadline floor
    #[must_use]
    pub fn with_min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    /// Build HTTP clients for every descriptor
    ///
    /// A descriptor whose client cannot be built (usually a missing API key)
    /// stays registered so it shows up in listings, but every call to it
    /// fails as unreachable.
    pub fn from_descriptors(mut self, descriptors: &[ProviderDescriptor]) -> Self {
        for descriptor in descriptors {
            match OpenAiCompatProvider::from_descriptor(descriptor) {
                Ok(client) => self.register(descriptor.clone(), Arc::new(client)),
                Err(e) => {
                    warn!(provider = %descriptor.name, error = %e, "provider registered without a client");
                    self.entries
                        .insert(descriptor.name.clone(), PoolEntry::new(descriptor.clone(), None));
                }
            }
        }
        self
    }

    /// Register a provider, replacing any entry with the same name
    pub fn register(&mut self, descriptor: ProviderDescriptor, client: Arc<dyn ChatProvider>) {
        debug!(provider = %descriptor.name, "registering provider");
        self.entries
            .insert(descriptor.name.clone(), PoolEntry::new(descriptor, Some(client)));
    }

    /// Builder-style [`register`](Self::register)
    #[must_use]
    pub fn with_provider(mut self, descriptor: ProviderDescriptor, client: Arc<dyn ChatProvider>) -> Self {
        self.register(descriptor, client);
        self
    }

    /// All descriptors, sorted by name
    #[must_use]
    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        let mut list: Vec<_> = self.entries.values().map(|e| e.descriptor.clone()).collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    /// Look up a descriptor by name
    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<&ProviderDescriptor> {
        self.entries.get(name).map(|e| &e.descriptor)
    }

    /// Whether the named provider has a usable client
    #[must_use]
    pub fn is_available(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(|e| e.client.is_some())
    }

    /// Number of registered providers
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no provider is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deadline for a call to `descriptor`
    #[must_use]
    pub fn timeout_for(&self, descriptor: &ProviderDescriptor) -> Duration {
        let scaled = Duration::try_from_secs_f64(
            descriptor.expected_latency_ms as f64 * self.safety_factor / 1000.0,
        )
        .unwrap_or(Duration::MAX);
        scaled.max(self.min_timeout)
    }

    /// Dispatch one call to the named provider
    ///
    /// Never returns an error: failures are reported inside the outcome.
    #[instrument(skip(self, prompt), fields(provider = %provider_name, max_tokens))]
    pub async fn call(&self, provider_name: &str, prompt: &str, max_tokens: u32) -> CallOutcome {
        let start = Instant::now();
        let admission = match self.entries.get(provider_name).map(|e| e.throttle.try_admit()) {
            Some(Err(refusal)) => {
                let failure = ProviderFailure::from(refusal);
                debug!(error = %failure.message, "provider call throttled");
                return CallOutcome {
                    provider: provider_name.to_string(),
                    latency_ms: start.elapsed().as_millis() as u64,
                    result: Err(failure),
                    throttled: true,
                };
            }
            Some(Ok(admission)) => Some(admission),
            None => None,
        };

        let result = self.dispatch(provider_name, prompt, max_tokens).await;
        let latency_ms = start.elapsed().as_millis() as u64;
        drop(admission);

        match &result {
            Ok(_) => debug!(latency_ms, "provider call succeeded"),
            Err(failure) => warn!(latency_ms, kind = %failure.kind, error = %failure.message, "provider call failed"),
        }

        CallOutcome {
            provider: provider_name.to_string(),
            latency_ms,
            result,
            throttled: false,
        }
    }

    async fn dispatch(
        &self,
        provider_name: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> std::result::Result<Completion, ProviderFailure> {
        let entry = self.entries.get(provider_name).ok_or_else(|| ProviderFailure {
            kind: FailureKind::Unreachable,
            message: format!("provider {provider_name} is not registered"),
        })?;
        let client = entry.client.as_ref().ok_or_else(|| ProviderFailure {
            kind: FailureKind::Unreachable,
            message: format!("provider {provider_name} has no configured client"),
        })?;

        let deadline = self.timeout_for(&entry.descriptor);
        let response: Result<Completion> =
            match tokio::time::timeout(deadline, client.send(prompt, max_tokens)).await {
                Ok(inner) => inner,
                Err(_) => Err(Error::Timeout(deadline.as_millis() as u64)),
            };
        response.map_err(ProviderFailure::from)
    }
}
