//! Registry - Tool registration, discovery and invocation
//!
//! Tools are registered once at startup behind `Arc<dyn Tool>` and tagged
//! with a [`Capability`]. Registration overwrites by name and there is no
//! removal path. Invocation isolates the handler on its own task so that an
//! error or a panic comes back as a structured [`Error`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// What a tool is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// Text processing
    Text,
    /// Routing introspection
    Routing,
    /// Runtime diagnostics
    Diagnostics,
    /// Context store access
    Memory,
}

impl Capability {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Routing => "routing",
            Self::Diagnostics => "diagnostics",
            Self::Memory => "memory",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tool metadata and schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON schema for parameters
    pub parameters: serde_json::Value,
    /// Capability tag
    pub capability: Capability,
}

impl ToolDefinition {
    /// Create a new tool definition with an empty object schema
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
            capability: Capability::Text,
        }
    }

    /// Set the parameters schema
    #[must_use]
    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set the capability
    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capability = capability;
        self
    }
}

/// Result of a successful tool invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Tool that ran
    pub tool: String,
    /// Output data
    pub output: serde_json::Value,
    /// Execution duration in milliseconds
    pub duration_ms: u64,
}

/// Trait for tool implementations
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool definition
    fn definition(&self) -> &ToolDefinition;

    /// Execute the tool with given input
    async fn execute(&self, input: serde_json::Value) -> Result<serde_json::Value>;

    /// Validate input before execution
    fn validate_input(&self, input: &serde_json::Value) -> Result<()> {
        if !input.is_object() {
            return Err(Error::InvalidInput("input must be an object".to_string()));
        }
        Ok(())
    }
}

/// Registry for managing tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name.clone();
        debug!(tool = %name, capability = %tool.definition().capability, "Registering tool");
        let previous = self
            .tools
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.clone(), tool);
        if previous.is_some() {
            debug!(tool = %name, "Replaced existing tool");
        }
    }

    /// Get a tool by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.read().get(name).cloned()
    }

    /// Check if a tool exists
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// All tool names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// All tool definitions, sorted by name
    #[must_use]
    pub fn list(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .read()
            .values()
            .map(|t| t.definition().clone())
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Tool definitions with the given capability, sorted by name
    #[must_use]
    pub fn list_by_capability(&self, capability: Capability) -> Vec<ToolDefinition> {
        self.list()
            .into_iter()
            .filter(|d| d.capability == capability)
            .collect()
    }

    /// Get tool count
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Invoke a tool by name
    ///
    /// # Errors
    /// - [`Error::NotFound`] with the sorted list of known names
    /// - [`Error::InvalidInput`] when the arguments fail validation
    /// - [`Error::ExecutionFailed`] when the handler errors or panics
    #[instrument(skip(self, input), fields(tool = %name))]
    pub async fn invoke(&self, name: &str, input: serde_json::Value) -> Result<ToolResult> {
        let tool = self.get(name).ok_or_else(|| Error::NotFound {
            name: name.to_string(),
            available: self.names(),
        })?;

        tool.validate_input(&input)?;

        let start = Instant::now();
        let handle = tokio::spawn(async move { tool.execute(input).await });
        let joined = handle.await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let output = match joined {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(error = %e, "Tool handler returned an error");
                return Err(Error::ExecutionFailed {
                    name: name.to_string(),
                    message: e.to_string(),
                });
            }
            Err(join_err) => {
                let message = if join_err.is_panic() {
                    format!("handler panicked: {}", panic_message(join_err.into_panic()))
                } else {
                    "handler was cancelled".to_string()
                };
                warn!(error = %message, "Tool handler aborted");
                return Err(Error::ExecutionFailed {
                    name: name.to_string(),
                    message,
                });
            }
        };

        debug!(duration_ms, "Tool completed");
        Ok(ToolResult {
            tool: name.to_string(),
            output,
            duration_ms,
        })
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<dyn Tool>>> {
        self.tools.read().unwrap_or_else(|e| e.into_inner())
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
