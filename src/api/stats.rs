//! Stats API endpoint
//!
//! GET /api/v1/stats - Per-provider, cache, routing and cost statistics

use axum::extract::Extension;
use axum::routing::get;
use axum::{Json, Router};
use modelmux_core::{Coordinator, StatsReport};
use std::sync::Arc;

use super::ApiResponse;

async fn get_stats(
    Extension(coordinator): Extension<Arc<Coordinator>>,
) -> Json<ApiResponse<StatsReport>> {
    Json(ApiResponse::success(coordinator.get_stats()))
}

/// Create stats routes
pub fn stats_routes() -> Router {
    Router::new().route("/api/v1/stats", get(get_stats))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{app, coordinator, send};
    use axum::http::StatusCode;
    use modelmux_llm::ScriptedProvider;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_stats_after_requests() {
        let coordinator = coordinator(vec![Arc::new(ScriptedProvider::new("groq"))]);
        let app = app(Arc::clone(&coordinator));

        for _ in 0..2 {
            let (status, _) = send(app.clone(), "POST", "/api/v1/chat", Some(json!({"message": "hello"}))).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, body) = send(app, "GET", "/api/v1/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["per_provider"]["groq"]["requests"], 1);
        assert_eq!(data["cache"]["hits"], 1);
        assert_eq!(data["cache"]["misses"], 1);
        assert_eq!(data["routing"]["total_routed"], 1);
        assert_eq!(data["routing"]["cache_served"], 1);
        assert_eq!(data["cost"]["savings_percentage"], 0.0);
    }
}
