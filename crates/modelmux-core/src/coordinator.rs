//! Coordinator - the request pipeline
//!
//! ```text
//! RECEIVED → CACHE_LOOKUP → CACHE_HIT → RESPOND
//!                         → CACHE_MISS → CONTEXT_FETCH → ROUTE → DISPATCH
//!                                        → [fallback] → CACHE_STORE → RESPOND
//! ```
//!
//! The coordinator is the only writer of cache entries and aggregate stats.
//! A request either completes with a [`ChatResponse`] or ends in a single
//! terminal [`Error`].

use crate::bridge::{AugmentedPrompt, ContextBridge};
use crate::cache::{CacheStats, CachedResponse, ResponseCache};
use crate::config::{ContextBackend, CoordinatorConfig};
use crate::error::{AttemptFailure, Error, Result};
use crate::fingerprint::Fingerprint;
use crate::request::{ChatRequest, ChatResponse};
use crate::router::{Router, RoutingDecision};
use crate::rules::RuleTable;
use crate::shutdown::ShutdownController;
use crate::stats::{AttemptOutcome, StatsRegistry};
use crate::tools::{ListProvidersTool, RoutePreviewTool};
use modelmux_llm::{count_tokens, Completion, ProviderDescriptor, ProviderPool};
use modelmux_memory::{ContextStore, Exchange, HttpContextStore, InMemoryContextStore};
use modelmux_tools::{register_builtins, ToolDefinition, ToolRegistry, ToolResult};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Per-provider section of [`StatsReport`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderReport {
    /// Attempts dispatched
    pub requests: u64,
    /// Failed attempts
    pub failures: u64,
    /// Mean attempt latency, 0 before the first attempt
    pub avg_latency_ms: u64,
    /// Total actual cost in USD
    pub total_cost: f64,
}

/// Routing section of [`StatsReport`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingReport {
    /// Requests served per provider
    pub distribution_by_provider: BTreeMap<String, u64>,
    /// Requests served by any provider
    pub total_routed: u64,
    /// Requests served from the cache
    pub cache_served: u64,
}

/// Cost section of [`StatsReport`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostReport {
    /// Total actual cost in USD
    pub actual: f64,
    /// What the baseline provider would have charged, in USD
    pub baseline: f64,
    /// `(1 - actual / baseline) * 100`, 0 without a baseline
    pub savings_percentage: f64,
}

/// Context write-back section of [`StatsReport`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextReport {
    /// Store implementation name
    pub store: String,
    /// Exchanges waiting for write-back
    pub pending: usize,
    /// Exchanges written
    pub stored: u64,
    /// Exchanges whose write failed
    pub failed: u64,
    /// Exchanges dropped on queue overflow
    pub dropped: u64,
}

/// Everything `get_stats` exports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    /// Per-provider counters
    pub per_provider: BTreeMap<String, ProviderReport>,
    /// Cache counters
    pub cache: CacheStats,
    /// Routing distribution
    pub routing: RoutingReport,
    /// Cost and savings
    pub cost: CostReport,
    /// Write-back counters, absent without a context store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextReport>,
}

/// Builder for [`Coordinator`]
#[derive(Default)]
#[must_use]
pub struct CoordinatorBuilder {
    config: CoordinatorConfig,
    pool: Option<ProviderPool>,
    context_store: Option<Arc<dyn ContextStore>>,
    tools: Option<Arc<ToolRegistry>>,
}

impl CoordinatorBuilder {
    /// Start from a configuration
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Use a prepared pool instead of building HTTP clients from config
    ///
    /// The pool's descriptors replace `config.providers`.
    pub fn pool(mut self, pool: ProviderPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Use this context store instead of the configured backend
    pub fn context_store(mut self, store: Arc<dyn ContextStore>) -> Self {
        self.context_store = Some(store);
        self
    }

    /// Use this tool registry; builtins are still added
    pub fn tool_registry(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Validate configuration and assemble the coordinator
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] for invalid settings or rules.
    pub fn build(self) -> Result<Arc<Coordinator>> {
        let mut config = self.config;

        let pool = match self.pool {
            Some(pool) => {
                config.providers = pool.descriptors();
                pool
            }
            None => ProviderPool::new()
                .with_safety_factor(config.routing.safety_factor)
                .with_min_timeout(Duration::from_millis(config.routing.min_timeout_ms))
                .from_descriptors(&config.providers),
        };
        config.validate()?;

        let rules = RuleTable::from_config(&config.routing.rules)?;
        let stats = Arc::new(StatsRegistry::new(
            config.providers.iter().map(|p| p.name.clone()),
        ));
        let router = Arc::new(Router::new(config.providers.clone(), rules, Arc::clone(&stats)));

        let cache = Arc::new(ResponseCache::new(
            Duration::from_secs(config.cache.default_ttl_secs),
            config.cache.max_entries,
        ));

        let store: Option<Arc<dyn ContextStore>> = match self.context_store {
            Some(store) => Some(store),
            None => match config.context.backend {
                ContextBackend::None => None,
                ContextBackend::Memory => Some(Arc::new(InMemoryContextStore::new(
                    config.context.memory_capacity,
                ))),
                ContextBackend::Http => {
                    let endpoint = config.context.endpoint.clone().ok_or_else(|| {
                        Error::Configuration("context.endpoint is required".to_string())
                    })?;
                    Some(Arc::new(HttpContextStore::new(
                        endpoint,
                        Duration::from_millis(config.context.query_timeout_ms.max(1000)),
                    )?))
                }
            },
        };
        let bridge = store.map(|store| {
            Arc::new(ContextBridge::new(
                store,
                config.context.top_k,
                Duration::from_millis(config.context.query_timeout_ms),
                config.context.budget_tokens,
                config.context.queue_capacity,
            ))
        });

        let tools = self.tools.unwrap_or_default();
        register_builtins(&tools);
        tools.register(Arc::new(ListProvidersTool::new(
            Arc::clone(&router),
            Arc::clone(&stats),
        )));
        tools.register(Arc::new(RoutePreviewTool::new(Arc::clone(&router))));

        let baseline = config
            .routing
            .baseline_provider
            .as_deref()
            .and_then(|name| config.providers.iter().find(|p| p.name == name))
            .cloned();

        let shutdown =
            ShutdownController::with_timeout(Duration::from_secs(config.shutdown_timeout_secs));

        info!(
            providers = config.providers.len(),
            rules = router.rules().len(),
            context = bridge.is_some(),
            tools = tools.len(),
            "coordinator built"
        );

        Ok(Arc::new(Coordinator {
            config,
            pool,
            router,
            cache,
            stats,
            bridge,
            tools,
            baseline,
            shutdown,
            workers: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }))
    }
}

/// Orchestrates cache, context, routing and dispatch for every request
pub struct Coordinator {
    config: CoordinatorConfig,
    pool: ProviderPool,
    router: Arc<Router>,
    cache: Arc<ResponseCache>,
    stats: Arc<StatsRegistry>,
    bridge: Option<Arc<ContextBridge>>,
    tools: Arc<ToolRegistry>,
    baseline: Option<ProviderDescriptor>,
    shutdown: Arc<ShutdownController>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl Coordinator {
    /// Start a builder
    pub fn builder(config: CoordinatorConfig) -> CoordinatorBuilder {
        CoordinatorBuilder::new(config)
    }

    /// Spawn background workers (write-back, cache sweeper)
    ///
    /// Calling it more than once has no effect.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut workers = self.workers.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bridge) = &self.bridge {
            workers.push(bridge.spawn_worker(self.shutdown.token()));
        }
        if self.config.cache.sweep_interval_secs > 0 {
            workers.push(self.cache.spawn_sweeper(
                Duration::from_secs(self.config.cache.sweep_interval_secs),
                self.shutdown.token(),
            ));
        }
        info!(workers = workers.len(), "coordinator started");
    }

    /// Stop admitting requests, drain in-flight ones and stop the workers
    pub async fn shutdown(&self) {
        self.shutdown.shutdown().await;

        let workers: Vec<JoinHandle<()>> = self
            .workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(error = %e, "background worker ended abnormally");
            }
        }
        info!("coordinator stopped");
    }

    /// Whether new requests are admitted
    #[must_use]
    pub fn is_accepting(&self) -> bool {
        self.shutdown.is_accepting_work()
    }

    /// Handle a request
    pub async fn handle(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.handle_with_cancel(request, CancellationToken::new()).await
    }

    /// Handle a request that the caller may cancel
    ///
    /// Cancellation drops the in-flight provider call. Nothing is cached and
    /// only attempts that had already completed stay in the stats.
    #[instrument(skip(self, request, cancel), fields(request_id = tracing::field::Empty, mode = %request.priority_mode))]
    pub async fn handle_with_cancel(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChatResponse> {
        let _guard = self.shutdown.register_request();
        if !self.shutdown.is_accepting_work() {
            return Err(Error::ShuttingDown);
        }

        let request_id = uuid::Uuid::new_v4().to_string();
        tracing::Span::current().record("request_id", request_id.as_str());
        let start = Instant::now();
        debug!(state = "RECEIVED", "request received");

        if let Err(e) = request.validate(self.config.max_tokens_limit) {
            debug!(state = "FAILED", error = %e, "request rejected");
            return Err(e);
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = self.run(&request_id, &request, start) => result,
        };

        match &result {
            Ok(response) => debug!(
                state = "RESPOND",
                provider = %response.provider,
                cache_hit = response.cache_hit,
                latency_ms = response.latency_ms,
                "request completed"
            ),
            Err(e) => debug!(state = "FAILED", error = %e, "request failed"),
        }
        result
    }

    async fn run(&self, request_id: &str, request: &ChatRequest, start: Instant) -> Result<ChatResponse> {
        let fingerprint = Fingerprint::of(request);
        debug!(state = "CACHE_LOOKUP", fingerprint = %fingerprint, "checking cache");

        if let Some(cached) = self.cache.get(&fingerprint) {
            debug!(state = "CACHE_HIT", "serving from cache");
            self.stats.record_cache_hit();
            return Ok(ChatResponse {
                content: cached.content,
                provider: cached.provider,
                latency_ms: elapsed_ms(start),
                cache_hit: true,
                context_snippets: 0,
                request_id: request_id.to_string(),
            });
        }
        debug!(state = "CACHE_MISS", "cache miss");

        debug!(state = "CONTEXT_FETCH", "fetching context");
        let augmented = match &self.bridge {
            Some(bridge) => bridge.augment(&request.message).await,
            None => AugmentedPrompt::plain(&request.message),
        };

        let max_attempts = 1 + self.config.routing.max_fallbacks;
        let mut excluded: HashSet<String> = HashSet::new();
        let mut failures: Vec<AttemptFailure> = Vec::new();
        let mut dispatched = 0;

        while dispatched < max_attempts {
            let Some(decision) = self.router.route(request, &excluded) else {
                debug!(attempted = excluded.len(), "no candidates left");
                break;
            };
            debug!(
                state = "ROUTE",
                provider = %decision.chosen_provider,
                reasoning = %decision.reasoning,
                "provider selected"
            );

            debug!(state = "DISPATCH", provider = %decision.chosen_provider, "dispatching");
            let outcome = self
                .pool
                .call(&decision.chosen_provider, &augmented.prompt, request.max_tokens)
                .await;

            match outcome.result {
                Ok(completion) => {
                    let (cost, baseline_cost) =
                        self.costs(&decision, &augmented.prompt, &completion);
                    self.stats.record_attempt(
                        &outcome.provider,
                        outcome.latency_ms,
                        AttemptOutcome::Served {
                            cost,
                            baseline_cost,
                        },
                    );

                    debug!(state = "CACHE_STORE", "caching response");
                    self.cache.insert(
                        fingerprint,
                        CachedResponse {
                            content: completion.content.clone(),
                            provider: outcome.provider.clone(),
                        },
                    );

                    if let Some(bridge) = &self.bridge {
                        bridge.submit(Exchange::new(
                            request_id,
                            request.message.clone(),
                            completion.content.clone(),
                            outcome.provider.clone(),
                        ));
                    }

                    return Ok(ChatResponse {
                        content: completion.content,
                        provider: outcome.provider,
                        latency_ms: elapsed_ms(start),
                        cache_hit: false,
                        context_snippets: augmented.snippets_used,
                        request_id: request_id.to_string(),
                    });
                }
                Err(failure) if outcome.throttled => {
                    debug!(provider = %outcome.provider, "provider throttled, falling back");
                    excluded.insert(outcome.provider.clone());
                    failures.push(AttemptFailure {
                        provider: outcome.provider,
                        kind: failure.kind,
                        message: failure.message,
                        latency_ms: outcome.latency_ms,
                    });
                }
                Err(failure) => {
                    dispatched += 1;
                    self.stats.record_attempt(
                        &outcome.provider,
                        outcome.latency_ms,
                        AttemptOutcome::Failed,
                    );
                    debug!(
                        provider = %outcome.provider,
                        kind = %failure.kind,
                        "attempt failed, falling back"
                    );
                    excluded.insert(outcome.provider.clone());
                    failures.push(AttemptFailure {
                        provider: outcome.provider,
                        kind: failure.kind,
                        message: failure.message,
                        latency_ms: outcome.latency_ms,
                    });
                }
            }
        }

        if failures.is_empty() {
            Err(Error::NoEligibleProvider(request.priority_mode))
        } else {
            warn!(attempts = failures.len(), "all providers failed");
            Err(Error::AllProvidersFailed { attempts: failures })
        }
    }

    /// Actual and baseline cost of a completion
    fn costs(&self, decision: &RoutingDecision, prompt: &str, completion: &Completion) -> (f64, f64) {
        let tokens = completion
            .usage
            .map(|u| u.total_tokens)
            .unwrap_or_else(|| (count_tokens(prompt) + count_tokens(&completion.content)) as u32);

        let cost = self
            .pool
            .descriptor(&decision.chosen_provider)
            .map_or(0.0, |d| d.cost_for_tokens(tokens));
        let baseline_cost = self
            .baseline
            .as_ref()
            .map_or(0.0, |b| b.cost_for_tokens(tokens));
        (cost, baseline_cost)
    }

    /// Routing decision for a request, without dispatching
    #[must_use]
    pub fn preview_route(&self, request: &ChatRequest) -> Option<RoutingDecision> {
        self.router.route(request, &HashSet::new())
    }

    /// Registered tools, sorted by name
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.tools.list()
    }

    /// Invoke a tool by name
    ///
    /// # Errors
    /// Returns [`Error::Tool`] wrapping not-found, invalid-input or
    /// execution failures.
    pub async fn call_tool(&self, name: &str, arguments: serde_json::Value) -> Result<ToolResult> {
        Ok(self.tools.invoke(name, arguments).await?)
    }

    /// Configured provider descriptors, sorted by name
    #[must_use]
    pub fn providers(&self) -> Vec<ProviderDescriptor> {
        self.pool.descriptors()
    }

    /// The response cache
    #[must_use]
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Export all statistics
    #[must_use]
    pub fn get_stats(&self) -> StatsReport {
        let snapshot = self.stats.snapshot();

        let per_provider = snapshot
            .iter()
            .map(|(name, s)| {
                (
                    name.clone(),
                    ProviderReport {
                        requests: s.total_requests,
                        failures: s.total_failures,
                        avg_latency_ms: s.avg_latency_ms().unwrap_or(0),
                        total_cost: s.cumulative_cost,
                    },
                )
            })
            .collect();

        let distribution_by_provider: BTreeMap<String, u64> = snapshot
            .iter()
            .map(|(name, s)| (name.clone(), s.served))
            .collect();
        let total_routed = distribution_by_provider.values().sum();

        let actual: f64 = snapshot.values().map(|s| s.cumulative_cost).sum();
        let baseline: f64 = snapshot.values().map(|s| s.cumulative_baseline_cost).sum();
        let savings_percentage = if baseline > 0.0 {
            (1.0 - actual / baseline) * 100.0
        } else {
            0.0
        };

        StatsReport {
            per_provider,
            cache: self.cache.stats(),
            routing: RoutingReport {
                distribution_by_provider,
                total_routed,
                cache_served: self.stats.cache_served(),
            },
            cost: CostReport {
                actual,
                baseline,
                savings_percentage,
            },
            context: self.bridge.as_ref().map(|bridge| {
                let queue = bridge.queue();
                ContextReport {
                    store: bridge.store_name().to_string(),
                    pending: queue.len(),
                    stored: queue.stored_count(),
                    failed: queue.failed_count(),
                    dropped: queue.dropped_count(),
                }
            }),
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
