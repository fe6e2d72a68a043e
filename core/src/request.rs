use serde::Serialize;
use utoipa::ToSchema;

/// Language list applied when a caller does not pass one.
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_SEARCH_LIMIT: u32 = 20;
pub const MIN_SEARCH_LIMIT: u32 = 1;
pub const MAX_SEARCH_LIMIT: u32 = 500;

pub fn default_languages() -> Vec<String> {
    vec![DEFAULT_LANGUAGE.to_string()]
}

/// Free-text entity search
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SearchRequest {
    /// Search text (e.g. "Taylor Swift", "Eiffel Tower")
    pub query: String,
    /// ISO 639 language codes, in preference order (default ["en"])
    #[schema(required = false)]
    pub languages: Vec<String>,
    /// Optional schema.org type filter (e.g. ["Person", "Place"])
    #[serde(skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,
    /// Maximum results, 1-500 (default 20)
    #[schema(required = false, minimum = 1, maximum = 500)]
    pub limit: u32,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            languages: default_languages(),
            types: None,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

/// Batch lookup by machine id
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LookupRequest {
    /// Machine ids such as "/m/0dl567"; at least one
    pub ids: Vec<String>,
    /// ISO 639 language codes, in preference order (default ["en"])
    #[schema(required = false)]
    pub languages: Vec<String>,
}

impl LookupRequest {
    pub fn new(ids: Vec<String>) -> Self {
        Self {
            ids,
            languages: default_languages(),
        }
    }
}
