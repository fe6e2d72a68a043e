use std::sync::Arc;

use kgraph_mcp_runtime::{ClientConfig, KnowledgeGraphClient, ToolRegistry};

use crate::state::AppState;

/// Registry whose upstream is the discard port; fine for anything that
/// never reaches the Knowledge Graph API.
pub fn offline_registry() -> Arc<ToolRegistry> {
    let client = KnowledgeGraphClient::new(
        ClientConfig::new("test-key").with_base_url("http://127.0.0.1:9"),
    )
    .expect("offline client should build");
    Arc::new(ToolRegistry::new(client))
}

pub fn offline_state() -> AppState {
    AppState::new(offline_registry(), false)
}

pub fn offline_state_with_json() -> AppState {
    AppState::new(offline_registry(), true)
}
