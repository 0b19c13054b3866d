//! Per-provider statistics
//!
//! One set of atomic counters per provider, created once from the pool's
//! descriptors, so updates from concurrent requests never contend on a lock.
//! [`StatsRegistry::record_attempt`] is the only way provider counters change.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Costs are accumulated in millionths of a dollar
const MICROS_PER_DOLLAR: f64 = 1_000_000.0;

fn to_micros(usd: f64) -> u64 {
    (usd.max(0.0) * MICROS_PER_DOLLAR).round() as u64
}

fn from_micros(micros: u64) -> f64 {
    micros as f64 / MICROS_PER_DOLLAR
}

#[derive(Default)]
struct ProviderCounters {
    requests: AtomicU64,
    failures: AtomicU64,
    latency_ms: AtomicU64,
    served: AtomicU64,
    cost_micros: AtomicU64,
    baseline_micros: AtomicU64,
}

/// How a provider attempt ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttemptOutcome {
    /// The provider served the request
    Served {
        /// Actual cost in USD
        cost: f64,
        /// What the baseline provider would have charged, in USD
        baseline_cost: f64,
    },
    /// The attempt failed
    Failed,
}

/// Snapshot of one provider's counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderStats {
    /// Provider name
    pub provider_name: String,
    /// Attempts dispatched to this provider
    pub total_requests: u64,
    /// Attempts that failed
    pub total_failures: u64,
    /// Sum of attempt latencies, failures included
    pub cumulative_latency_ms: u64,
    /// Sum of actual costs in USD
    pub cumulative_cost: f64,
    /// Requests this provider answered
    pub served: u64,
    /// Sum of baseline costs in USD for the requests it answered
    pub cumulative_baseline_cost: f64,
}

impl ProviderStats {
    /// Mean attempt latency, `None` before the first attempt
    #[must_use]
    pub fn avg_latency_ms(&self) -> Option<u64> {
        (self.total_requests > 0).then(|| self.cumulative_latency_ms / self.total_requests)
    }
}

/// Aggregate statistics owned by the coordinator
pub struct StatsRegistry {
    providers: HashMap<String, Arc<ProviderCounters>>,
    cache_served: AtomicU64,
}

impl StatsRegistry {
    /// Create counters for a fixed set of providers
    #[must_use]
    pub fn new<I, S>(provider_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            providers: provider_names
                .into_iter()
                .map(|name| (name.into(), Arc::new(ProviderCounters::default())))
                .collect(),
            cache_served: AtomicU64::new(0),
        }
    }

    /// Record one completed provider attempt
    pub fn record_attempt(&self, provider: &str, latency_ms: u64, outcome: AttemptOutcome) {
        let Some(counters) = self.providers.get(provider) else {
            debug!(provider, "attempt for unknown provider not recorded");
            return;
        };

        counters.requests.fetch_add(1, Ordering::Relaxed);
        counters.latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        match outcome {
            AttemptOutcome::Served {
                cost,
                baseline_cost,
            } => {
                counters.served.fetch_add(1, Ordering::Relaxed);
                counters.cost_micros.fetch_add(to_micros(cost), Ordering::Relaxed);
                counters
                    .baseline_micros
                    .fetch_add(to_micros(baseline_cost), Ordering::Relaxed);
            }
            AttemptOutcome::Failed => {
                counters.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Record a request answered from the cache
    pub fn record_cache_hit(&self) {
        self.cache_served.fetch_add(1, Ordering::Relaxed);
    }

    /// Requests answered from the cache
    #[must_use]
    pub fn cache_served(&self) -> u64 {
        self.cache_served.load(Ordering::Relaxed)
    }

    /// Mean observed latency for every provider with at least one attempt
    #[must_use]
    pub fn observed_latencies(&self) -> HashMap<String, u64> {
        self.providers
            .iter()
            .filter_map(|(name, c)| {
                let requests = c.requests.load(Ordering::Relaxed);
                (requests > 0)
                    .then(|| (name.clone(), c.latency_ms.load(Ordering::Relaxed) / requests))
            })
            .collect()
    }

    /// Snapshot of one provider
    #[must_use]
    pub fn provider(&self, name: &str) -> Option<ProviderStats> {
        self.providers.get(name).map(|c| snapshot(name, c))
    }

    /// Snapshot of every provider, keyed by name
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, ProviderStats> {
        self.providers
            .iter()
            .map(|(name, c)| (name.clone(), snapshot(name, c)))
            .collect()
    }
}

fn snapshot(name: &str, c: &ProviderCounters) -> ProviderStats {
    ProviderStats {
        provider_name: name.to_string(),
        total_requests: c.requests.load(Ordering::Relaxed),
        total_failures: c.failures.load(Ordering::Relaxed),
        cumulative_latency_ms: c.latency_ms.load(Ordering::Relaxed),
        cumulative_cost: from_micros(c.cost_micros.load(Ordering::Relaxed)),
        served: c.served.load(Ordering::Relaxed),
        cumulative_baseline_cost: from_micros(c.baseline_micros.load(Ordering::Relaxed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_attempts() {
        let stats = StatsRegistry::new(["a", "b"]);
        stats.record_attempt("a", 100, AttemptOutcome::Failed);
        stats.record_attempt(
            "a",
            300,
            AttemptOutcome::Served {
                cost: 0.002,
                baseline_cost: 0.03,
            },
        );

        let a = stats.provider("a").unwrap();
        assert_eq!(a.total_requests, 2);
        assert_eq!(a.total_failures, 1);
        assert_eq!(a.served, 1);
        assert_eq!(a.avg_latency_ms(), Some(200));
        assert!((a.cumulative_cost - 0.002).abs() < 1e-9);
        assert!((a.cumulative_baseline_cost - 0.03).abs() < 1e-9);

        assert_eq!(stats.provider("b").unwrap().avg_latency_ms(), None);
    }

    #[test]
    fn test_observed_latencies_only_seen() {
        let stats = StatsRegistry::new(["a", "b"]);
        stats.record_attempt("b", 42, AttemptOutcome::Failed);
        let observed = stats.observed_latencies();
        assert_eq!(observed.len(), 1);
        assert_eq!(observed["b"], 42);
    }

    #[test]
    fn test_unknown_provider_ignored() {
        let stats = StatsRegistry::new(["a"]);
        stats.record_attempt("ghost", 1, AttemptOutcome::Failed);
        assert!(stats.provider("ghost").is_none());
        assert_eq!(stats.snapshot().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_not_lost() {
        let stats = Arc::new(StatsRegistry::new(["a"]));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let stats = Arc::clone(&stats);
            handles.push(tokio::spawn(async move {
                for _ in 0..1000 {
                    stats.record_attempt("a", 1, AttemptOutcome::Failed);
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(stats.provider("a").unwrap().total_requests, 8000);
    }
}
