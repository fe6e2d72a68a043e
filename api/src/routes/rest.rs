use axum::body::Bytes;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use kgraph_core::ToolResult;
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/search", post(search))
        .route("/api/lookup", post(lookup))
}

/// Empty bodies and non-object JSON count as no arguments, so the tool's own
/// validation decides what is missing.
fn arguments(body: &[u8]) -> Result<Map<String, Value>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Ok(Map::new()),
        Err(err) => Err(AppError::Validation(format!("Invalid JSON body: {err}"))),
    }
}

/// Search the Knowledge Graph by free text
#[utoipa::path(
    post,
    path = "/api/search",
    request_body = kgraph_core::SearchRequest,
    responses(
        (status = 200, description = "Matching entities", body = ToolResult),
        (status = 400, description = "Invalid arguments", body = kgraph_core::error::ApiError),
        (status = 500, description = "Knowledge Graph API failure", body = kgraph_core::error::ApiError)
    ),
    tag = "knowledge-graph"
)]
pub async fn search(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ToolResult>, AppError> {
    let args = arguments(&body)?;
    let result = state.registry.search(&args).await?;
    Ok(Json(result))
}

/// Fetch entities by Knowledge Graph id
#[utoipa::path(
    post,
    path = "/api/lookup",
    request_body = kgraph_core::LookupRequest,
    responses(
        (status = 200, description = "Entities for the given ids", body = ToolResult),
        (status = 400, description = "Missing or empty ids", body = kgraph_core::error::ApiError),
        (status = 500, description = "Knowledge Graph API failure", body = kgraph_core::error::ApiError)
    ),
    tag = "knowledge-graph"
)]
pub async fn lookup(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ToolResult>, AppError> {
    let args = arguments(&body)?;
    let result = state.registry.lookup(&args).await?;
    Ok(Json(result))
}
