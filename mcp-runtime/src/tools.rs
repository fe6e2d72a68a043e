use kgraph_core::error::messages;
use kgraph_core::request::{MAX_SEARCH_LIMIT, MIN_SEARCH_LIMIT, default_languages};
use kgraph_core::{LookupRequest, SearchRequest, ToolResult};
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::client::KnowledgeGraphClient;
use crate::error::ToolError;

pub const SEARCH_TOOL: &str = "search_knowledge_graph";
pub const LOOKUP_TOOL: &str = "lookup_knowledge_graph_entities";

#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: SEARCH_TOOL,
            description: "Search Google Knowledge Graph for entities by name or topic. Returns structured information about real-world entities like people, places, organizations, and concepts from Google's public knowledge base.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query for entities (e.g., \"Taylor Swift\", \"Eiffel Tower\", \"Python programming\")"
                    },
                    "languages": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Language codes (ISO 639, e.g., [\"en\", \"es\", \"fr\"]). Default: [\"en\"]"
                    },
                    "types": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Filter by schema.org types (e.g., [\"Person\", \"Organization\", \"Place\"])"
                    },
                    "limit": {
                        "type": "number",
                        "minimum": MIN_SEARCH_LIMIT,
                        "maximum": MAX_SEARCH_LIMIT,
                        "description": "Maximum results to return (1-500). Default: 20"
                    }
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: LOOKUP_TOOL,
            description: "Look up specific Knowledge Graph entities by their Machine IDs (MIDs). Use this when you already know the entity IDs from a previous search. MIDs look like /m/0dl567 or /g/11b6vwtjpg.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "ids": {
                        "type": "array",
                        "items": { "type": "string" },
                        "minItems": 1,
                        "description": "Entity Machine IDs (MIDs) to lookup (e.g., [\"/m/0dl567\"])"
                    },
                    "languages": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Language codes for results. Default: [\"en\"]"
                    }
                },
                "required": ["ids"]
            }),
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolContent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

/// `tools/call` result envelope. Failures are flagged, never raised.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub content: Vec<ToolContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn success(result: &ToolResult) -> Self {
        let text = serde_json::to_string_pretty(result).unwrap_or_else(|_| "{}".to_string());
        Self {
            content: vec![ToolContent { kind: "text", text }],
            structured_content: serde_json::to_value(result).ok(),
            is_error: false,
        }
    }

    pub fn failure(err: &ToolError) -> Self {
        Self {
            content: vec![ToolContent {
                kind: "text",
                text: format!("Error: {err}"),
            }],
            structured_content: None,
            is_error: true,
        }
    }

    pub fn text(&self) -> &str {
        self.content
            .first()
            .map(|content| content.text.as_str())
            .unwrap_or_default()
    }
}

/// The two Knowledge Graph tools bound to one upstream client.
#[derive(Clone, Debug)]
pub struct ToolRegistry {
    client: KnowledgeGraphClient,
}

impl ToolRegistry {
    pub fn new(client: KnowledgeGraphClient) -> Self {
        Self { client }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        tool_definitions()
    }

    pub async fn invoke(&self, name: &str, args: &Map<String, Value>) -> ToolCallResult {
        let outcome = match name {
            SEARCH_TOOL => self.search(args).await,
            LOOKUP_TOOL => self.lookup(args).await,
            _ => Err(ToolError::UnknownTool(name.to_string())),
        };

        match outcome {
            Ok(result) => {
                tracing::info!(
                    event = "tool_call_succeeded",
                    tool = name,
                    count = result.count,
                    "Tool call succeeded"
                );
                ToolCallResult::success(&result)
            }
            Err(err) => {
                tracing::warn!(
                    event = "tool_call_failed",
                    tool = name,
                    field = ?err.field(),
                    error = %err,
                    "Tool call failed"
                );
                ToolCallResult::failure(&err)
            }
        }
    }

    pub async fn search(&self, args: &Map<String, Value>) -> Result<ToolResult, ToolError> {
        let req = parse_search_request(args)?;
        let raw = self.client.search(&req).await?;
        Ok(ToolResult::from_raw(raw))
    }

    pub async fn lookup(&self, args: &Map<String, Value>) -> Result<ToolResult, ToolError> {
        let req = parse_lookup_request(args)?;
        let raw = self.client.lookup(&req).await?;
        Ok(ToolResult::from_raw(raw))
    }
}

pub fn parse_search_request(args: &Map<String, Value>) -> Result<SearchRequest, ToolError> {
    let mut req = SearchRequest::new(required_string(args, "query")?);
    if let Some(languages) = arg_optional_string_array(args, "languages")? {
        req.languages = non_empty_or_default(languages);
    }
    req.types = arg_optional_string_array(args, "types")?.filter(|types| !types.is_empty());
    if let Some(limit) = arg_optional_limit(args, "limit")? {
        req.limit = limit;
    }
    Ok(req)
}

pub fn parse_lookup_request(args: &Map<String, Value>) -> Result<LookupRequest, ToolError> {
    let ids = match args.get("ids") {
        Some(Value::Array(_)) => arg_optional_string_array(args, "ids")?.unwrap_or_default(),
        _ => Vec::new(),
    };
    if ids.is_empty() {
        return Err(ToolError::validation("ids", messages::IDS_REQUIRED));
    }

    let mut req = LookupRequest::new(ids);
    if let Some(languages) = arg_optional_string_array(args, "languages")? {
        req.languages = non_empty_or_default(languages);
    }
    Ok(req)
}

fn non_empty_or_default(languages: Vec<String>) -> Vec<String> {
    if languages.is_empty() {
        default_languages()
    } else {
        languages
    }
}

fn required_string(args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    let value = args
        .get(key)
        .ok_or_else(|| ToolError::validation(key, format!("Missing required field '{key}'")))?;
    match value {
        Value::String(v) if !v.trim().is_empty() => Ok(v.clone()),
        Value::String(_) => Err(ToolError::validation(key, format!("'{key}' must not be empty"))),
        _ => Err(ToolError::validation(key, format!("'{key}' must be a string"))),
    }
}

/// Accepts any JSON number with an integral value in the allowed range.
fn arg_optional_limit(args: &Map<String, Value>, key: &str) -> Result<Option<u32>, ToolError> {
    let out_of_range = || {
        ToolError::validation(
            key,
            format!("'{key}' must be an integer between {MIN_SEARCH_LIMIT} and {MAX_SEARCH_LIMIT}"),
        )
    };
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            let value = n.as_f64().ok_or_else(out_of_range)?;
            if value.fract() != 0.0
                || value < f64::from(MIN_SEARCH_LIMIT)
                || value > f64::from(MAX_SEARCH_LIMIT)
            {
                return Err(out_of_range());
            }
            Ok(Some(value as u32))
        }
        Some(_) => Err(out_of_range()),
    }
}

fn arg_optional_string_array(
    args: &Map<String, Value>,
    key: &str,
) -> Result<Option<Vec<String>>, ToolError> {
    let Some(value) = args.get(key) else {
        return Ok(None);
    };
    if value.is_null() {
        return Ok(None);
    }
    let items = value
        .as_array()
        .ok_or_else(|| ToolError::validation(key, format!("'{key}' must be an array of strings")))?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let text = item
            .as_str()
            .ok_or_else(|| ToolError::validation(key, format!("'{key}' items must be strings")))?;
        let normalized = text.trim();
        if !normalized.is_empty() {
            out.push(normalized.to_string());
        }
    }
    Ok(Some(out))
}
