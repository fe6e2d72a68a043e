use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use kgraph_mcp_runtime::McpServer;
use serde_json::Value;

use crate::error::AppError;
use crate::state::AppState;
use crate::transport::session_stream;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sse", get(open_session))
        .route("/message/{session_id}", post(post_message))
}

/// Each connection gets its own protocol-server instance and session id.
async fn open_session(State(state): State<AppState>) -> Response {
    let pending = state.sessions.connect();
    let endpoint = format!("/message/{}", pending.id());
    let server = McpServer::new(state.registry.clone());
    let (session, inbox) = pending.activate();

    tracing::debug!(
        event = "mcp_sse_connected",
        session_id = %session.id(),
        state = ?session.state(),
        instance_id = %server.instance_id(),
        "SSE client connected"
    );

    session_stream(endpoint, server, inbox, session)
}

/// Replies travel over the session's event stream, not this response.
async fn post_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    body: Bytes,
) -> Result<Response, AppError> {
    if !state.sessions.contains(&session_id) {
        tracing::warn!(
            event = "mcp_session_not_found",
            session_id = %session_id,
            "Message for unknown session"
        );
        return Err(AppError::SessionNotFound);
    }

    let message: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Invalid JSON-RPC message: {e}")))?;

    state
        .sessions
        .forward(&session_id, message)
        .map_err(|_| AppError::SessionNotFound)?;

    Ok((StatusCode::ACCEPTED, "Accepted").into_response())
}
