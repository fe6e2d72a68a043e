use axum::http::{HeaderName, Method};
use tower_http::cors::{Any, CorsLayer};

use crate::transport::streamable::SESSION_ID_HEADER;

/// Permissive CORS for browser-hosted MCP clients.
///
/// - Origins: any
/// - Methods: GET, POST, DELETE, OPTIONS
/// - Headers: Content-Type, Authorization, Mcp-Session-Id, Mcp-Protocol-Version
/// - Exposed: Mcp-Session-Id
/// - Credentials: not allowed (incompatible with a wildcard origin)
pub fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
            HeaderName::from_static(SESSION_ID_HEADER),
            HeaderName::from_static("mcp-protocol-version"),
        ])
        .expose_headers([HeaderName::from_static(SESSION_ID_HEADER)])
        .max_age(std::time::Duration::from_secs(3600))
}
