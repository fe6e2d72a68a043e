use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{RawQuery, State};
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use serde_json::Value;

use crate::client::{ClientConfig, KnowledgeGraphClient};

/// Stand-in for the Knowledge Graph API that answers every request with a
/// fixed status and body and records what it was asked.
pub struct StubBackend {
    pub base_url: String,
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

#[derive(Clone)]
struct StubState {
    status: StatusCode,
    body: Value,
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

impl StubBackend {
    pub async fn spawn(status: StatusCode, body: Value) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = StubState {
            status,
            body,
            requests: requests.clone(),
        };
        let app = Router::new().fallback(respond).with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("stub backend should bind");
        let addr = listener.local_addr().expect("stub backend should have an address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
        }
    }

    /// `(path, raw query)` for each request received so far.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().expect("stub lock").clone()
    }

    pub fn hits(&self) -> usize {
        self.requests.lock().expect("stub lock").len()
    }

    pub fn client(&self) -> KnowledgeGraphClient {
        KnowledgeGraphClient::new(ClientConfig::new("test-key").with_base_url(&self.base_url))
            .expect("stub client should build")
    }
}

async fn respond(
    State(state): State<StubState>,
    uri: Uri,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    state
        .requests
        .lock()
        .expect("stub lock")
        .push((uri.path().to_string(), query.unwrap_or_default()));
    (state.status, axum::Json(state.body.clone()))
}
