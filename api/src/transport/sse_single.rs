use std::sync::{Arc, Mutex, MutexGuard};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use kgraph_mcp_runtime::McpServer;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::state::AppState;
use crate::transport::session_stream;

const MESSAGE_ENDPOINT: &str = "/message";

struct Binding {
    id: String,
    inbox: mpsc::UnboundedSender<Value>,
}

/// The one discoverable SSE channel. A new connection replaces the previous
/// binding; the superseded stream ends once its sender is gone.
#[derive(Default)]
pub struct LatestBinding {
    current: Mutex<Option<Binding>>,
}

impl LatestBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(self: &Arc<Self>) -> (BindingGuard, mpsc::UnboundedReceiver<Value>) {
        let (inbox, receiver) = mpsc::unbounded_channel();
        let id = Uuid::now_v7().simple().to_string();

        let previous = self.lock().replace(Binding {
            id: id.clone(),
            inbox,
        });
        tracing::info!(
            event = "mcp_single_bound",
            binding_id = %id,
            replaced = ?previous.as_ref().map(|binding| binding.id.as_str()),
            "SSE channel bound"
        );

        (
            BindingGuard {
                id,
                binding: Arc::clone(self),
            },
            receiver,
        )
    }

    /// `false` when nothing live is bound.
    pub fn deliver(&self, message: Value) -> bool {
        let mut current = self.lock();
        let Some(binding) = current.as_ref() else {
            return false;
        };
        if binding.inbox.send(message).is_err() {
            *current = None;
            return false;
        }
        true
    }

    pub fn current_id(&self) -> Option<String> {
        self.lock().as_ref().map(|binding| binding.id.clone())
    }

    fn release(&self, id: &str) {
        let mut current = self.lock();
        if current.as_ref().is_some_and(|binding| binding.id == id) {
            *current = None;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Binding>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Clears the binding on drop, unless a newer connection already took over.
pub struct BindingGuard {
    id: String,
    binding: Arc<LatestBinding>,
}

impl BindingGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for BindingGuard {
    fn drop(&mut self) {
        self.binding.release(&self.id);
        tracing::info!(
            event = "mcp_single_closed",
            binding_id = %self.id,
            "SSE channel closed"
        );
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sse", get(open_channel))
        .route(MESSAGE_ENDPOINT, post(post_message))
}

async fn open_channel(State(state): State<AppState>) -> Response {
    let server = McpServer::new(state.registry.clone());
    let (guard, inbox) = state.binding.bind();
    session_stream(MESSAGE_ENDPOINT.to_string(), server, inbox, guard)
}

/// Always acknowledged; delivery is best-effort to the latest channel.
async fn post_message(State(state): State<AppState>, body: Bytes) -> Response {
    match serde_json::from_slice::<Value>(&body) {
        Ok(message) => {
            if state.binding.deliver(message) {
                tracing::debug!(
                    event = "mcp_single_delivered",
                    binding_id = ?state.binding.current_id(),
                    "Message delivered to SSE channel"
                );
            } else {
                tracing::warn!(
                    event = "mcp_single_unbound",
                    "Message received with no live SSE channel"
                );
            }
        }
        Err(err) => {
            tracing::warn!(
                event = "mcp_single_parse_error",
                error = %err,
                "Discarding unparseable MCP message"
            );
        }
    }

    (StatusCode::ACCEPTED, Json(json!({ "received": true }))).into_response()
}
