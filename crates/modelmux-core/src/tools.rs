//! Tools that inspect the coordinator's providers and routing

use crate::request::ChatRequest;
use crate::router::Router;
use crate::stats::StatsRegistry;
use modelmux_llm::PriorityMode;
use modelmux_tools::{Capability, Error, Result, Tool, ToolDefinition};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Lists configured providers without secrets
pub struct ListProvidersTool {
    definition: ToolDefinition,
    router: Arc<Router>,
    stats: Arc<StatsRegistry>,
}

impl ListProvidersTool {
    /// Create the tool
    #[must_use]
    pub fn new(router: Arc<Router>, stats: Arc<StatsRegistry>) -> Self {
        let definition = ToolDefinition::new(
            "list_providers",
            "List configured providers with their latency, cost and eligibility",
        )
        .with_capability(Capability::Diagnostics);
        Self {
            definition,
            router,
            stats,
        }
    }
}

#[async_trait::async_trait]
impl Tool for ListProvidersTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, _input: serde_json::Value) -> Result<serde_json::Value> {
        let mut providers: Vec<_> = self.router.providers().iter().collect();
        providers.sort_by(|a, b| a.name.cmp(&b.name));

        let list: Vec<serde_json::Value> = providers
            .into_iter()
            .map(|p| {
                let observed = self.stats.provider(&p.name).and_then(|s| s.avg_latency_ms());
                serde_json::json!({
                    "name": p.name,
                    "endpoint": p.endpoint,
                    "model_id": p.model_id,
                    "role": p.role,
                    "modes": p.modes,
                    "priority_rank": p.priority_rank,
                    "expected_latency_ms": p.expected_latency_ms,
                    "observed_latency_ms": observed,
                    "cost_per_unit": p.cost_per_unit,
                    "credential_env": p.auth_credential_ref,
                    "credential_present": p
                        .auth_credential_ref
                        .as_ref()
                        .map(|var| std::env::var(var).is_ok()),
                })
            })
            .collect();

        Ok(serde_json::json!({ "providers": list }))
    }
}

#[derive(Debug, Deserialize)]
struct RoutePreviewInput {
    message: String,
    #[serde(default)]
    priority_mode: PriorityMode,
    #[serde(default)]
    model_hint: Option<String>,
}

/// Shows the routing decision a message would get, without dispatching it
pub struct RoutePreviewTool {
    definition: ToolDefinition,
    router: Arc<Router>,
}

impl RoutePreviewTool {
    /// Create the tool
    #[must_use]
    pub fn new(router: Arc<Router>) -> Self {
        let definition = ToolDefinition::new(
            "route_preview",
            "Show which provider a message would be routed to right now",
        )
        .with_parameters(serde_json::json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "Message to route"
                },
                "priority_mode": {
                    "type": "string",
                    "enum": ["cost", "latency", "balanced"],
                    "description": "Routing priority (default: balanced)"
                },
                "model_hint": {
                    "type": "string",
                    "description": "Preferred model family"
                }
            },
            "required": ["message"]
        }))
        .with_capability(Capability::Routing);
        Self { definition, router }
    }
}

#[async_trait::async_trait]
impl Tool for RoutePreviewTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, input: serde_json::Value) -> Result<serde_json::Value> {
        let input: RoutePreviewInput = serde_json::from_value(input)
            .map_err(|e| Error::Execution(format!("invalid arguments: {e}")))?;

        let mut request = ChatRequest::new(input.message).with_mode(input.priority_mode);
        request.model_hint = input.model_hint;

        let decision = self
            .router
            .route(&request, &HashSet::new())
            .ok_or_else(|| {
                Error::Execution(format!(
                    "no provider is eligible for {} mode",
                    request.priority_mode
                ))
            })?;

        serde_json::to_value(decision).map_err(|e| Error::Execution(e.to_string()))
    }
}
