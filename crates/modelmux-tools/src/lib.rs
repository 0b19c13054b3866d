//! modelmux-tools - Tool registry
//!
//! This crate provides the tool system for modelmux:
//! - Registry: capability-tagged tool registration, listing and invocation
//! - Builtins: tools that depend only on their input

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builtins;
pub mod error;
pub mod registry;

pub use builtins::{register_builtins, SummarizeTool};
pub use error::{Error, Result};
pub use registry::{Capability, Tool, ToolDefinition, ToolRegistry, ToolResult};
