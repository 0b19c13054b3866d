//! Health check endpoint
//!
//! `/health` reports liveness plus provider availability, for load balancers.

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use modelmux_core::Coordinator;
use serde::Serialize;
use std::sync::Arc;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub providers: usize,
    pub cache_entries: usize,
}

async fn health_check(
    Extension(coordinator): Extension<Arc<Coordinator>>,
) -> (StatusCode, Json<HealthResponse>) {
    let (status, code) = if coordinator.is_accepting() {
        ("healthy", StatusCode::OK)
    } else {
        ("draining", StatusCode::SERVICE_UNAVAILABLE)
    };

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            providers: coordinator.providers().len(),
            cache_entries: coordinator.cache().len(),
        }),
    )
}

/// Create health routes
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health_check))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{app, coordinator, send};
    use axum::http::StatusCode;
    use modelmux_llm::ScriptedProvider;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_health_reports_draining_after_shutdown() {
        let coordinator = coordinator(vec![Arc::new(ScriptedProvider::new("groq"))]);

        let (status, body) = send(app(Arc::clone(&coordinator)), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["providers"], 1);

        coordinator.shutdown().await;
        let (status, body) = send(app(coordinator), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "draining");
    }
}
