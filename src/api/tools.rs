//! Tools API endpoints
//!
//! GET /api/v1/tools - List all available tools
//! POST /api/v1/tools/:name - Invoke a tool with JSON arguments

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use modelmux_core::Coordinator;
use modelmux_tools::{ToolDefinition, ToolResult};
use std::sync::Arc;

use super::{ApiError, ApiResponse};

async fn list_tools(
    Extension(coordinator): Extension<Arc<Coordinator>>,
) -> Json<ApiResponse<Vec<ToolDefinition>>> {
    Json(ApiResponse::success(coordinator.list_tools()))
}

async fn call_tool(
    Extension(coordinator): Extension<Arc<Coordinator>>,
    Path(name): Path<String>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<ApiResponse<ToolResult>>, ApiError> {
    let Json(arguments) =
        payload.map_err(|e| ApiError::rejected(StatusCode::UNPROCESSABLE_ENTITY, &e))?;
    let result = coordinator.call_tool(&name, arguments).await?;
    Ok(Json(ApiResponse::success(result)))
}

/// Create tools routes
pub fn tools_routes() -> Router {
    Router::new()
        .route("/api/v1/tools", get(list_tools))
        .route("/api/v1/tools/:name", post(call_tool))
}
