use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Prefix the Knowledge Graph puts in front of machine ids (`kg:/m/0dr90`).
pub const MID_PREFIX: &str = "kg:";

/// Category used when the upstream record carries no usable `@type`.
pub const DEFAULT_ENTITY_TYPE: &str = "Thing";

/// An unprocessed entity record as returned by the upstream API.
///
/// The upstream payload is JSON-LD with every field optional, so the record is
/// kept as an untyped object and read defensively at normalization time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawEntity(Map<String, Value>);

impl RawEntity {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Set `key` only when the record does not already carry it.
    pub fn insert_if_absent(&mut self, key: &str, value: Value) {
        self.0.entry(key.to_string()).or_insert(value);
    }

    fn non_empty_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    fn nested_str(&self, key: &str, field: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(|value| value.get(field))
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }
}

impl From<Map<String, Value>> for RawEntity {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Stable, agent-facing entity shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEntity {
    /// Machine id with the `kg:` prefix removed (e.g. "/m/0dr90")
    pub mid: String,
    /// Display name, empty when the upstream omits it
    pub name: String,
    /// schema.org categories; never empty
    #[serde(rename = "type")]
    pub types: Vec<String>,
    /// Short description (e.g. "Theoretical physicist")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Article body from `detailedDescription.articleBody`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_description: Option<String>,
    /// Image URL from `image.contentUrl`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Official website
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Upstream relevance score
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_score: Option<f64>,
}

/// Payload returned by both tools and both REST fallback routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ToolResult {
    pub entities: Vec<NormalizedEntity>,
    /// Always equal to `entities.len()`
    pub count: usize,
}

impl ToolResult {
    pub fn new(entities: Vec<NormalizedEntity>) -> Self {
        let count = entities.len();
        Self { entities, count }
    }

    pub fn from_raw(raw: Vec<RawEntity>) -> Self {
        Self::new(raw.iter().map(normalize).collect())
    }
}

/// Map one upstream record to the stable output shape. Never fails.
pub fn normalize(raw: &RawEntity) -> NormalizedEntity {
    let mid = raw
        .get("@id")
        .and_then(Value::as_str)
        .map(strip_mid_prefix)
        .unwrap_or_default()
        .to_string();

    NormalizedEntity {
        mid,
        name: raw.non_empty_str("name").unwrap_or_default().to_string(),
        types: entity_types(raw.get("@type")),
        description: raw.non_empty_str("description").map(str::to_string),
        detailed_description: raw
            .nested_str("detailedDescription", "articleBody")
            .map(str::to_string),
        image: raw.nested_str("image", "contentUrl").map(str::to_string),
        url: raw.non_empty_str("url").map(str::to_string),
        result_score: raw.get("resultScore").and_then(Value::as_f64),
    }
}

/// Strip every leading `kg:`; ids without it pass through unchanged.
pub fn strip_mid_prefix(mut id: &str) -> &str {
    while let Some(rest) = id.strip_prefix(MID_PREFIX) {
        id = rest;
    }
    id
}

fn entity_types(value: Option<&Value>) -> Vec<String> {
    let types: Vec<String> = match value {
        Some(Value::String(single)) if !single.is_empty() => vec![single.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    if types.is_empty() {
        vec![DEFAULT_ENTITY_TYPE.to_string()]
    } else {
        types
    }
}
