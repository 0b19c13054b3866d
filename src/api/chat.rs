//! Chat API endpoint
//!
//! POST /api/v1/chat - Route a request through cache, context and providers

use axum::extract::rejection::JsonRejection;
use axum::extract::Extension;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use modelmux_core::{ChatRequest, ChatResponse, Coordinator};
use std::sync::Arc;

use super::{ApiError, ApiResponse};

async fn chat(
    Extension(coordinator): Extension<Arc<Coordinator>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ChatResponse>>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::rejected(StatusCode::BAD_REQUEST, &e))?;
    let response = coordinator.handle(request).await?;
    Ok(Json(ApiResponse::success(response)))
}

/// Create chat routes
pub fn chat_routes() -> Router {
    Router::new().route("/api/v1/chat", post(chat))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{app, coordinator, send, send_raw};
    use axum::http::StatusCode;
    use modelmux_llm::ScriptedProvider;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_chat_success() {
        let groq = Arc::new(ScriptedProvider::new("groq").with_default_reply("hi there"));
        let app = app(coordinator(vec![groq]));

        let (status, body) = send(app, "POST", "/api/v1/chat", Some(json!({"message": "hello"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["content"], "hi there");
        assert_eq!(body["data"]["provider"], "groq");
        assert_eq!(body["data"]["cache_hit"], false);
    }

    #[tokio::test]
    async fn test_chat_rejects_empty_message() {
        let app = app(coordinator(vec![Arc::new(ScriptedProvider::new("groq"))]));

        let (status, body) = send(app, "POST", "/api/v1/chat", Some(json!({"message": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("message"));
    }

    #[tokio::test]
    async fn test_chat_rejects_unknown_mode_with_envelope() {
        let app = app(coordinator(vec![Arc::new(ScriptedProvider::new("groq"))]));

        let (status, body) = send(
            app,
            "POST",
            "/api/v1/chat",
            Some(json!({"message": "hi", "priority_mode": "fastest"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("priority_mode"));
    }

    #[tokio::test]
    async fn test_chat_rejects_malformed_json() {
        let app = app(coordinator(vec![Arc::new(ScriptedProvider::new("groq"))]));

        let (status, body) = send_raw(app, "/api/v1/chat", "{\"message\": ").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_chat_all_providers_failed() {
        let a = Arc::new(ScriptedProvider::new("a"));
        a.push_failure(modelmux_llm::Error::Api("500 Internal Server Error".into()));
        let b = Arc::new(ScriptedProvider::new("b"));
        b.push_failure(modelmux_llm::Error::Network("connection refused".into()));
        let app = app(coordinator(vec![a, b]));

        let (status, body) = send(app, "POST", "/api/v1/chat", Some(json!({"message": "hello"}))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let attempts = body["data"]["attempts"].as_array().unwrap();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0]["provider"], "a");
        assert_eq!(attempts[0]["kind"], "error");
        assert_eq!(attempts[1]["kind"], "unreachable");
    }

    #[tokio::test]
    async fn test_chat_after_shutdown() {
        let coordinator = coordinator(vec![Arc::new(ScriptedProvider::new("groq"))]);
        coordinator.shutdown().await;

        let (status, body) = send(app(coordinator), "POST", "/api/v1/chat", Some(json!({"message": "hello"}))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);
    }
}
