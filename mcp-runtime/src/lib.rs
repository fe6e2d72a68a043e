//! MCP runtime for the Google Knowledge Graph tools.
//!
//! Everything transport-agnostic lives here: the upstream client, the tool
//! registry and the JSON-RPC protocol server. HTTP transports are in
//! `kgraph-api`; the stdio loop is in [`stdio`].

pub mod client;
pub mod error;
pub mod server;
pub mod stdio;
pub mod tools;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use client::{ClientConfig, KnowledgeGraphClient};
pub use error::{KgError, ToolError};
pub use server::McpServer;
pub use tools::{ToolCallResult, ToolRegistry};
