//! modelmux-llm - provider clients for modelmux
//!
//! This crate provides:
//! - [`ProviderDescriptor`]: config-loaded description of one backend
//! - [`ChatProvider`]: the uniform provider contract
//! - [`OpenAiCompatProvider`]: HTTP client for OpenAI-compatible APIs
//! - [`ProviderPool`]: one client per provider, deadline-bounded dispatch
//! - [`ProviderThrottle`]: per-provider call budget and concurrency cap
//! - [`ScriptedProvider`]: scripted test double
//! - Token counting for context budgets and cost estimates

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod limiter;
pub mod mock;
pub mod openai_compat;
pub mod pool;
pub mod provider;
pub mod token;
pub mod util;

pub use error::{Error, Result};
pub use limiter::{ProviderThrottle, Refusal};
pub use mock::ScriptedProvider;
pub use openai_compat::{OpenAiCompatConfig, OpenAiCompatProvider};
pub use pool::{CallOutcome, FailureKind, ProviderFailure, ProviderPool};
pub use provider::{
    ChatProvider, Completion, PriorityMode, ProviderDescriptor, ProviderRole, TokenUsage,
};
pub use token::{count_tokens, TokenCounter};
