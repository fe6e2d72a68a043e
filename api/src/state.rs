use std::sync::Arc;

use kgraph_mcp_runtime::{McpServer, ToolRegistry};

use crate::transport::session::SessionStore;
use crate::transport::sse_single::LatestBinding;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ToolRegistry>,
    /// Keyed SSE sessions
    pub sessions: Arc<SessionStore>,
    /// Single-channel SSE binding
    pub binding: Arc<LatestBinding>,
    /// Server instance behind `/mcp`
    pub shared_server: McpServer,
    pub json_response: bool,
}

impl AppState {
    pub fn new(registry: Arc<ToolRegistry>, json_response: bool) -> Self {
        Self {
            shared_server: McpServer::new(registry.clone()),
            registry,
            sessions: Arc::new(SessionStore::new()),
            binding: Arc::new(LatestBinding::new()),
            json_response,
        }
    }
}
