//! CLI module for modelmux
//!
//! Provides commands:
//! - `serve`: run the HTTP service
//! - `route`: show the routing decision for a message without dispatching it
//! - `tools`: list registered tools
//! - `check`: validate and print the effective configuration

use anyhow::Context;
use clap::{Parser, Subcommand};
use modelmux_core::{ChatRequest, PriorityMode};

pub mod check;

/// modelmux CLI
#[derive(Parser, Debug)]
#[command(name = "modelmux")]
#[command(about = "Multi-provider request routing and caching coordinator")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the server
    Serve,
    /// Show which provider a message would be routed to
    Route {
        /// Message to route
        message: String,
        /// Priority mode: cost, latency or balanced
        #[arg(long, default_value = "balanced")]
        mode: PriorityMode,
        /// Preferred model family
        #[arg(long)]
        model_hint: Option<String>,
    },
    /// List registered tools
    Tools,
    /// Validate configuration and print it with secrets masked
    Check,
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Serve) => crate::server::run().await,
        Some(Commands::Route {
            message,
            mode,
            model_hint,
        }) => route(message, mode, model_hint),
        Some(Commands::Tools) => tools(),
        Some(Commands::Check) => check::run(),
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn route(message: String, mode: PriorityMode, model_hint: Option<String>) -> anyhow::Result<()> {
    let config = crate::server::load_config()?;
    let coordinator = crate::server::build_coordinator(&config)?;

    let mut request = ChatRequest::new(message).with_mode(mode);
    request.model_hint = model_hint;

    let decision = coordinator
        .preview_route(&request)
        .with_context(|| format!("No provider is eligible for {mode} mode"))?;
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}

fn tools() -> anyhow::Result<()> {
    let config = crate::server::load_config()?;
    let coordinator = crate::server::build_coordinator(&config)?;

    for tool in coordinator.list_tools() {
        println!("{:<16} [{}] {}", tool.name, tool.capability.as_str(), tool.description);
    }
    Ok(())
}
