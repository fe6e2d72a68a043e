use std::sync::Arc;

use kgraph_core::SERVICE_NAME;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::tools::ToolRegistry;

/// Newest protocol revision this server speaks; offered when the client asks
/// for one we do not know.
pub const MCP_PROTOCOL_VERSION: &str = "2025-03-26";
const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = ["2024-11-05", "2025-03-26", "2025-06-18"];

/// One protocol-server instance: JSON-RPC 2.0 MCP handling over a shared
/// tool registry. Transports decide how many instances exist and how
/// messages reach them.
#[derive(Clone, Debug)]
pub struct McpServer {
    registry: Arc<ToolRegistry>,
    instance_id: String,
}

impl McpServer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            instance_id: format!("srv-{}", Uuid::now_v7().simple()),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Handle one incoming JSON-RPC payload (single message or batch).
    /// Notifications and client responses produce no output.
    pub async fn handle_incoming_message(&self, incoming: Value) -> Vec<Value> {
        let mut responses = Vec::new();

        if let Some(batch) = incoming.as_array() {
            if batch.is_empty() {
                responses.push(error_response(
                    Value::Null,
                    RpcError::invalid_request("Batch request must not be empty"),
                ));
                return responses;
            }
            for item in batch {
                if let Some(response) = self.handle_single_message(item.clone()).await {
                    responses.push(response);
                }
            }
            return responses;
        }

        if let Some(response) = self.handle_single_message(incoming).await {
            responses.push(response);
        }
        responses
    }

    async fn handle_single_message(&self, incoming: Value) -> Option<Value> {
        let Some(obj) = incoming.as_object() else {
            return Some(error_response(
                Value::Null,
                RpcError::invalid_request("Request must be a JSON object"),
            ));
        };

        if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            let id = obj.get("id").cloned().unwrap_or(Value::Null);
            return Some(error_response(
                id,
                RpcError::invalid_request("jsonrpc must be '2.0'"),
            ));
        }

        let Some(method) = obj.get("method").and_then(Value::as_str) else {
            // A client response; this server never issues requests.
            return None;
        };

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        if let Some(id) = obj.get("id").cloned() {
            let result = self.handle_request(method, params).await;
            Some(match result {
                Ok(payload) => success_response(id, payload),
                Err(err) => error_response(id, err),
            })
        } else {
            tracing::debug!(
                event = "mcp_notification",
                instance_id = %self.instance_id,
                method = %method,
                "MCP notification received"
            );
            None
        }
    }

    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize_payload(&params)),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            "resources/list" => Ok(json!({ "resources": [] })),
            "prompts/list" => Ok(json!({ "prompts": [] })),
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    fn initialize_payload(&self, params: &Value) -> Value {
        let requested = params.get("protocolVersion").and_then(Value::as_str);
        let protocol_version = requested
            .filter(|version| SUPPORTED_PROTOCOL_VERSIONS.contains(version))
            .unwrap_or(MCP_PROTOCOL_VERSION);

        tracing::info!(
            event = "mcp_initialize",
            instance_id = %self.instance_id,
            requested_version = ?requested,
            protocol_version,
            client = ?params.get("clientInfo").and_then(|info| info.get("name")),
            "MCP client initialized"
        );

        json!({
            "protocolVersion": protocol_version,
            "capabilities": {
                "tools": {
                    "listChanged": false
                }
            },
            "serverInfo": {
                "name": SERVICE_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }

    fn tools_list_payload(&self) -> Value {
        json!({ "tools": self.registry.definitions() })
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;

        let args = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };

        let result = self.registry.invoke(name, &args).await;
        serde_json::to_value(result)
            .map_err(|e| RpcError::internal(format!("Failed to encode tool result: {e}")))
    }
}

#[derive(Debug)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn parse_error() -> Self {
        Self {
            code: -32700,
            message: "Parse error".to_string(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {method}"),
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: -32603,
            message: message.into(),
        }
    }
}

pub fn success_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

pub fn error_response(id: Value, error: RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": error.code,
            "message": error.message
        }
    })
}

/// Response for a payload that was not valid JSON at all.
pub fn parse_error_response() -> Value {
    error_response(Value::Null, RpcError::parse_error())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientConfig, KnowledgeGraphClient};
    use crate::test_support::StubBackend;
    use axum::http::StatusCode;

    fn offline_server() -> McpServer {
        let client = KnowledgeGraphClient::new(
            ClientConfig::new("test-key").with_base_url("http://127.0.0.1:9"),
        )
        .unwrap();
        McpServer::new(Arc::new(ToolRegistry::new(client)))
    }

    async fn single(server: &McpServer, message: Value) -> Value {
        let mut responses = server.handle_incoming_message(message).await;
        assert_eq!(responses.len(), 1);
        responses.remove(0)
    }

    #[tokio::test]
    async fn initialize_echoes_supported_version_and_names_service() {
        let server = offline_server();
        let response = single(
            &server,
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "initialize",
                "params": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": { "name": "test-client", "version": "1.0.0" }
                }
            }),
        )
        .await;

        assert_eq!(response["id"], 1);
        assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(response["result"]["serverInfo"]["name"], SERVICE_NAME);
        assert!(response["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn initialize_offers_latest_for_unknown_version() {
        let server = offline_server();
        let response = single(
            &server,
            json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": { "protocolVersion": "1999-01-01" } }),
        )
        .await;
        assert_eq!(response["result"]["protocolVersion"], MCP_PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn tools_list_returns_both_tools() {
        let server = offline_server();
        let response = single(
            &server,
            json!({ "jsonrpc": "2.0", "id": "a", "method": "tools/list" }),
        )
        .await;
        let tools = response["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0]["name"], "search_knowledge_graph");
        assert_eq!(tools[1]["name"], "lookup_knowledge_graph_entities");
        assert!(tools[0]["inputSchema"].is_object());
    }

    #[tokio::test]
    async fn notifications_and_client_responses_produce_nothing() {
        let server = offline_server();
        let out = server
            .handle_incoming_message(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
            .await;
        assert!(out.is_empty());

        let out = server
            .handle_incoming_message(json!({ "jsonrpc": "2.0", "id": 9, "result": {} }))
            .await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn protocol_errors_use_jsonrpc_codes() {
        let server = offline_server();

        let unknown = single(&server, json!({ "jsonrpc": "2.0", "id": 1, "method": "nope" })).await;
        assert_eq!(unknown["error"]["code"], -32601);

        let wrong_version = single(&server, json!({ "jsonrpc": "1.0", "id": 2, "method": "ping" })).await;
        assert_eq!(wrong_version["error"]["code"], -32600);
        assert_eq!(wrong_version["id"], 2);

        let bad_params = single(
            &server,
            json!({ "jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": { "name": 5 } }),
        )
        .await;
        assert_eq!(bad_params["error"]["code"], -32602);

        let empty_batch = single(&server, json!([])).await;
        assert_eq!(empty_batch["error"]["code"], -32600);

        assert_eq!(parse_error_response()["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn batch_answers_only_requests() {
        let server = offline_server();
        let out = server
            .handle_incoming_message(json!([
                { "jsonrpc": "2.0", "id": 1, "method": "ping" },
                { "jsonrpc": "2.0", "method": "notifications/initialized" },
                { "jsonrpc": "2.0", "id": 2, "method": "prompts/list" }
            ]))
            .await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["id"], 1);
        assert_eq!(out[1]["result"]["prompts"], json!([]));
    }

    #[tokio::test]
    async fn unknown_tool_is_a_result_not_a_protocol_error() {
        let server = offline_server();
        let response = single(
            &server,
            json!({
                "jsonrpc": "2.0",
                "id": 4,
                "method": "tools/call",
                "params": { "name": "no_such_tool", "arguments": {} }
            }),
        )
        .await;
        assert!(response.get("error").is_none());
        assert_eq!(response["result"]["isError"], true);
        assert_eq!(
            response["result"]["content"][0]["text"],
            "Error: Unknown tool: no_such_tool"
        );
    }

    #[tokio::test]
    async fn tools_call_runs_search_through_registry() {
        let stub = StubBackend::spawn(
            StatusCode::OK,
            json!({ "itemListElement": [{ "result": { "@id": "kg:/m/0dr90", "@type": "Person" } }] }),
        )
        .await;
        let server = McpServer::new(Arc::new(ToolRegistry::new(stub.client())));

        let response = single(
            &server,
            json!({
                "jsonrpc": "2.0",
                "id": 5,
                "method": "tools/call",
                "params": { "name": "search_knowledge_graph", "arguments": { "query": "Albert Einstein", "limit": 1 } }
            }),
        )
        .await;

        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        let payload: Value = serde_json::from_str(text).unwrap();
        assert_eq!(payload["entities"][0]["mid"], "/m/0dr90");
        assert_eq!(payload["count"], 1);
    }
}
