pub mod entity;
pub mod error;
pub mod request;

pub use entity::{NormalizedEntity, RawEntity, ToolResult, normalize};
pub use request::{LookupRequest, SearchRequest};

/// Service name reported by health checks and MCP `serverInfo`.
pub const SERVICE_NAME: &str = "google-knowledge-graph-mcp";
