//! modelmux-core - routing, caching and coordination engine
//!
//! This crate provides:
//! - [`ResponseCache`]: fingerprint-keyed TTL cache with LRU bound
//! - [`Router`]: mode-aware provider ranking with rule overrides
//! - [`ContextBridge`]: context augmentation and write-back
//! - [`StatsRegistry`]: per-provider counters and cost accounting
//! - [`Coordinator`]: the request pipeline tying it all together

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bridge;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fingerprint;
pub mod request;
pub mod router;
pub mod rules;
pub mod shutdown;
pub mod stats;
pub mod tools;

pub use bridge::{AugmentedPrompt, ContextBridge, WriteBackQueue};
pub use cache::{CacheStats, CachedResponse, ResponseCache};
pub use config::{CacheConfig, ContextBackend, ContextConfig, CoordinatorConfig, RoutingConfig};
pub use coordinator::{
    ContextReport, Coordinator, CoordinatorBuilder, CostReport, ProviderReport, RoutingReport,
    StatsReport,
};
pub use error::{AttemptFailure, Error, Result};
pub use fingerprint::Fingerprint;
pub use request::{ChatRequest, ChatResponse};
pub use router::{rank_providers, Router, RoutingDecision};
pub use rules::{default_rules, Rule, RuleConfig, RuleTable};
pub use shutdown::{wait_for_shutdown_signal, ShutdownController, ShutdownPhase};
pub use stats::{AttemptOutcome, ProviderStats, StatsRegistry};
pub use tools::{ListProvidersTool, RoutePreviewTool};

pub use modelmux_llm::{PriorityMode, ProviderDescriptor};
