//! Router - provider selection
//!
//! Ranks the eligible providers for a request by observed latency (falling
//! back to the configured estimate for providers never tried), then priority
//! rank, then name. A matching rule can promote its preferred provider to
//! the front. [`rank_providers`] is pure: identical inputs always produce the
//! same decision.

use crate::request::ChatRequest;
use crate::rules::RuleTable;
use crate::stats::StatsRegistry;
use modelmux_llm::ProviderDescriptor;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// The outcome of routing one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingDecision {
    /// Provider to dispatch to
    pub chosen_provider: String,
    /// Human-readable explanation
    pub reasoning: String,
    /// Latency estimate used for ranking the chosen provider
    pub estimated_latency_ms: u64,
    /// Remaining candidates, in rank order
    pub fallback_chain: Vec<String>,
    /// Rule that matched the message, if any
    pub matched_rule: Option<String>,
}

/// Rank the providers eligible for `request`
///
/// Returns `None` when no provider is eligible.
#[must_use]
pub fn rank_providers(
    request: &ChatRequest,
    providers: &[ProviderDescriptor],
    observed: &HashMap<String, u64>,
    excluded: &HashSet<String>,
    rules: &RuleTable,
) -> Option<RoutingDecision> {
    let mode = request.priority_mode;
    let mut eligible: Vec<&ProviderDescriptor> = providers
        .iter()
        .filter(|p| p.supports_mode(mode) && !excluded.contains(&p.name))
        .collect();

    if let Some(hint) = request
        .model_hint
        .as_deref()
        .map(|h| h.trim().to_lowercase())
        .filter(|h| !h.is_empty())
    {
        let hinted: Vec<&ProviderDescriptor> = eligible
            .iter()
            .copied()
            .filter(|p| p.model_id.to_lowercase().contains(&hint))
            .collect();
        if hinted.is_empty() {
            debug!(hint = %hint, "no eligible provider matches model hint, ignoring it");
        } else {
            eligible = hinted;
        }
    }

    let latency_of =
        |p: &ProviderDescriptor| observed.get(&p.name).copied().unwrap_or(p.expected_latency_ms);

    eligible.sort_by(|a, b| {
        latency_of(*a)
            .cmp(&latency_of(*b))
            .then(a.priority_rank.cmp(&b.priority_rank))
            .then_with(|| a.name.cmp(&b.name))
    });

    let matched = rules.evaluate(&request.message);
    let mut promoted = false;
    if let Some(preferred) = matched.and_then(|r| r.preferred_provider()) {
        if let Some(pos) = eligible.iter().position(|p| p.name == preferred) {
            let provider = eligible.remove(pos);
            eligible.insert(0, provider);
            promoted = true;
        }
    }

    let (chosen, rest) = eligible.split_first()?;
    let estimated_latency_ms = latency_of(*chosen);
    let source = if observed.contains_key(&chosen.name) {
        "observed"
    } else {
        "expected"
    };

    let reasoning = match matched {
        Some(rule) if promoted => format!(
            "rule '{}' prefers {} ({} latency {}ms, {} mode)",
            rule.name(),
            chosen.name,
            source,
            estimated_latency_ms,
            mode
        ),
        Some(rule) => format!(
            "rule '{}' matched but its preferred provider is not eligible; {} ranks first ({} latency {}ms, {} mode)",
            rule.name(),
            chosen.name,
            source,
            estimated_latency_ms,
            mode
        ),
        None => format!(
            "{} ranks first ({} latency {}ms, {} mode)",
            chosen.name, source, estimated_latency_ms, mode
        ),
    };

    Some(RoutingDecision {
        chosen_provider: chosen.name.clone(),
        reasoning,
        estimated_latency_ms,
        fallback_chain: rest.iter().map(|p| p.name.clone()).collect(),
        matched_rule: matched.map(|r| r.name().to_string()),
    })
}

/// Routing policy bound to the configured providers and live stats
pub struct Router {
    providers: Vec<ProviderDescriptor>,
    rules: RuleTable,
    stats: Arc<StatsRegistry>,
}

impl Router {
    /// Create a router
    #[must_use]
    pub fn new(providers: Vec<ProviderDescriptor>, rules: RuleTable, stats: Arc<StatsRegistry>) -> Self {
        Self {
            providers,
            rules,
            stats,
        }
    }

    /// Decide where `request` goes, skipping `excluded` providers
    #[must_use]
    pub fn route(&self, request: &ChatRequest, excluded: &HashSet<String>) -> Option<RoutingDecision> {
        rank_providers(
            request,
            &self.providers,
            &self.stats.observed_latencies(),
            excluded,
            &self.rules,
        )
    }

    /// Configured providers
    #[must_use]
    pub fn providers(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    /// The rule table
    #[must_use]
    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }
}
