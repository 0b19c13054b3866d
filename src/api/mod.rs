//! Web API module for modelmux
//!
//! Provides REST API endpoints for:
//! - Chat requests through the coordinator
//! - Tool listing and invocation
//! - Statistics export
//! - Health checks

pub mod chat;
pub mod health;
pub mod stats;
pub mod tools;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use modelmux_core::Error;
use serde::Serialize;

pub use chat::chat_routes;
pub use health::health_routes;
pub use stats::stats_routes;
pub use tools::tools_routes;

/// JSON envelope shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// A coordinator error mapped to an HTTP status
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    data: Option<serde_json::Value>,
}

impl ApiError {
    /// A body the handler could not deserialize
    pub fn rejected(status: StatusCode, rejection: &JsonRejection) -> Self {
        Self {
            status,
            message: format!("invalid request body: {}", rejection.body_text()),
            data: None,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        let (status, data) = match err {
            Error::InvalidRequest(_) => (StatusCode::BAD_REQUEST, None),
            Error::AllProvidersFailed { attempts } => (
                StatusCode::BAD_GATEWAY,
                Some(serde_json::json!({ "attempts": attempts })),
            ),
            Error::NoEligibleProvider(_) | Error::ShuttingDown | Error::Cancelled => {
                (StatusCode::SERVICE_UNAVAILABLE, None)
            }
            Error::Tool(modelmux_tools::Error::NotFound { available, .. }) => (
                StatusCode::NOT_FOUND,
                Some(serde_json::json!({ "available": available })),
            ),
            Error::Tool(_) => (StatusCode::UNPROCESSABLE_ENTITY, None),
            Error::Configuration(_) | Error::Llm(_) | Error::Memory(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };
        Self {
            status,
            message,
            data,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse {
            success: false,
            data: self.data,
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

/// Create the API router with all `/api/v1` endpoints
pub fn api_router() -> Router {
    Router::new()
        .merge(chat_routes())
        .merge(tools_routes())
        .merge(stats_routes())
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::{Extension, Router};
    use modelmux_core::{ContextBackend, Coordinator, CoordinatorConfig};
    use modelmux_llm::{ProviderDescriptor, ProviderPool, ScriptedProvider};
    use std::sync::Arc;
    use tower::ServiceExt;

    pub fn coordinator(providers: Vec<Arc<ScriptedProvider>>) -> Arc<Coordinator> {
        let mut config = CoordinatorConfig::default();
        config.context.backend = ContextBackend::None;
        config.cache.sweep_interval_secs = 0;

        let mut pool = ProviderPool::new();
        for (i, provider) in providers.into_iter().enumerate() {
            let name = modelmux_llm::ChatProvider::name(provider.as_ref()).to_string();
            let latency = 300 + 100 * i as u64;
            pool.register(
                ProviderDescriptor::new(&name, format!("http://{name}.test/v1"), "test-model", latency),
                provider,
            );
        }
        Coordinator::builder(config).pool(pool).build().unwrap()
    }

    pub fn app(coordinator: Arc<Coordinator>) -> Router {
        super::api_router()
            .merge(super::health_routes())
            .layer(Extension(coordinator))
    }

    pub async fn send(
        app: Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    pub async fn send_raw(app: Router, uri: &str, body: &'static str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
    }
}
