use std::convert::Infallible;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use axum::response::sse::Event;
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, middleware};
use futures::stream;
use kgraph_mcp_runtime::server::parse_error_response;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::middleware::accept::{Accepts, ensure_event_stream_accept};
use crate::state::AppState;
use crate::transport::{message_event, sse_response};

pub const SESSION_ID_HEADER: &str = "mcp-session-id";

/// `/mcp` with `Accept` widened so clients that omit `text/event-stream`
/// are still served.
pub fn router() -> Router<AppState> {
    routes().layer(middleware::from_fn(ensure_event_stream_accept))
}

fn routes() -> Router<AppState> {
    Router::new().route("/mcp", any(handle_mcp))
}

/// Single entry point for every method on `/mcp`.
async fn handle_mcp(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let accepts = Accepts::from_headers(&headers);
    match method {
        Method::POST if !accepts.any() => not_acceptable(&method),
        Method::POST => handle_post(&state, accepts, &body).await,
        Method::GET if !accepts.event_stream => not_acceptable(&method),
        Method::GET => idle_stream(),
        other => {
            tracing::debug!(
                event = "mcp_method_not_allowed",
                method = %other,
                "Unsupported method on /mcp"
            );
            (
                StatusCode::METHOD_NOT_ALLOWED,
                [(header::ALLOW, "GET, POST")],
                jsonrpc_error("Method not allowed."),
            )
                .into_response()
        }
    }
}

fn jsonrpc_error(message: &str) -> Json<Value> {
    Json(json!({
        "jsonrpc": "2.0",
        "id": null,
        "error": { "code": -32000, "message": message }
    }))
}

fn not_acceptable(method: &Method) -> Response {
    tracing::debug!(
        event = "mcp_not_acceptable",
        method = %method,
        "Accept admits no /mcp response format"
    );
    let message = if *method == Method::GET {
        "Not Acceptable: Client must accept text/event-stream"
    } else {
        "Not Acceptable: Client must accept application/json or text/event-stream"
    };
    (StatusCode::NOT_ACCEPTABLE, jsonrpc_error(message)).into_response()
}

/// Streams unless the client cannot take a stream, or JSON mode is on and
/// the client takes JSON.
async fn handle_post(state: &AppState, accepts: Accepts, body: &[u8]) -> Response {
    let incoming: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(
                event = "mcp_parse_error",
                error = %err,
                "Rejecting unparseable MCP request"
            );
            return (StatusCode::BAD_REQUEST, Json(parse_error_response())).into_response();
        }
    };

    let is_batch = incoming.is_array();
    let session_id = contains_initialize(&incoming).then(|| Uuid::now_v7().simple().to_string());

    let mut responses = state.shared_server.handle_incoming_message(incoming).await;
    if responses.is_empty() {
        return StatusCode::ACCEPTED.into_response();
    }

    let as_json = !accepts.event_stream || (state.json_response && accepts.json);
    let mut response = if as_json {
        let body = if is_batch {
            Value::Array(responses)
        } else {
            responses.remove(0)
        };
        Json(body).into_response()
    } else {
        let events: Vec<Result<Event, Infallible>> =
            responses.iter().map(|r| Ok(message_event(r))).collect();
        sse_response(stream::iter(events))
    };

    if let Some(id) = session_id {
        tracing::info!(
            event = "mcp_streamable_session",
            session_id = %id,
            "Issued streamable session id"
        );
        if let Ok(value) = HeaderValue::from_str(&id) {
            response
                .headers_mut()
                .insert(HeaderName::from_static(SESSION_ID_HEADER), value);
        }
    }
    response
}

fn contains_initialize(incoming: &Value) -> bool {
    let is_initialize =
        |message: &Value| message.get("method").and_then(Value::as_str) == Some("initialize");
    match incoming {
        Value::Array(batch) => batch.iter().any(is_initialize),
        message => is_initialize(message),
    }
}

/// Server-initiated messages are never sent, so the stream only keeps alive.
fn idle_stream() -> Response {
    sse_response(stream::pending::<Result<Event, Infallible>>())
}
