//! Server initialization and run loop

use super::config::AppConfig;
use super::loader::load_config;
use anyhow::{Context, Result};
use axum::{routing::get, Extension, Router};
use modelmux_core::{wait_for_shutdown_signal, Coordinator};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Build the coordinator from configuration
pub fn build_coordinator(config: &AppConfig) -> Result<Arc<Coordinator>> {
    Coordinator::builder(config.coordinator.clone())
        .build()
        .context("Failed to build coordinator")
}

/// Create the application router
fn app(coordinator: Arc<Coordinator>) -> Router {
    Router::new()
        .merge(crate::api::health_routes())
        .merge(crate::api::api_router())
        .route("/", get(|| async { "modelmux" }))
        .layer(Extension(coordinator))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Run the HTTP server until a shutdown signal arrives
pub async fn run() -> Result<()> {
    let config = load_config()?;
    let coordinator = build_coordinator(&config)?;
    coordinator.start();

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app(Arc::clone(&coordinator)))
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .context("HTTP server error")?;

    coordinator.shutdown().await;
    info!("modelmux shutdown complete");
    Ok(())
}
