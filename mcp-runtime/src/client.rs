use kgraph_core::{LookupRequest, RawEntity, SearchRequest};
use serde_json::Value;
use url::Url;

use crate::error::KgError;

pub const DEFAULT_API_BASE_URL: &str = "https://kgsearch.googleapis.com";
const SEARCH_PATH: &str = "/v1/entities:search";

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Thin client over the Knowledge Graph Search API.
///
/// Search and id lookup share one endpoint; lookups pass repeated `ids`
/// parameters instead of `query`. Every call carries the static API key.
#[derive(Clone, Debug)]
pub struct KnowledgeGraphClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl KnowledgeGraphClient {
    pub fn new(config: ClientConfig) -> Result<Self, url::ParseError> {
        let endpoint = Url::parse(&format!(
            "{}{}",
            config.base_url.trim_end_matches('/'),
            SEARCH_PATH
        ))?;
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
            api_key: config.api_key,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Results come back in backend (relevance) order.
    pub async fn search(&self, req: &SearchRequest) -> Result<Vec<RawEntity>, KgError> {
        let mut params: Vec<(&str, &str)> = vec![("query", req.query.as_str())];
        params.extend(req.languages.iter().map(|lang| ("languages", lang.as_str())));
        if let Some(types) = &req.types {
            params.extend(types.iter().map(|kind| ("types", kind.as_str())));
        }
        let limit = req.limit.to_string();
        params.push(("limit", limit.as_str()));

        self.fetch_entities("search", &params).await
    }

    /// `req.ids` must be non-empty; the tool layer rejects empty batches first.
    pub async fn lookup(&self, req: &LookupRequest) -> Result<Vec<RawEntity>, KgError> {
        let mut params: Vec<(&str, &str)> =
            req.ids.iter().map(|id| ("ids", id.as_str())).collect();
        params.extend(req.languages.iter().map(|lang| ("languages", lang.as_str())));

        self.fetch_entities("lookup", &params).await
    }

    async fn fetch_entities(
        &self,
        operation: &'static str,
        params: &[(&str, &str)],
    ) -> Result<Vec<RawEntity>, KgError> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .extend_pairs(params)
            .append_pair("key", &self.api_key);

        tracing::debug!(
            event = "kg_upstream_request",
            operation,
            param_count = params.len(),
            "Calling Knowledge Graph API"
        );

        let response = self.http.get(url).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            tracing::warn!(
                event = "kg_upstream_error",
                operation,
                status = status.as_u16(),
                "Knowledge Graph API returned an error status"
            );
            return Err(KgError::Upstream {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        let payload: Value =
            serde_json::from_slice(&bytes).map_err(|e| KgError::Decode(e.to_string()))?;
        let entities = entities_from_payload(payload)?;

        tracing::debug!(
            event = "kg_upstream_response",
            operation,
            status = status.as_u16(),
            result_count = entities.len(),
            "Knowledge Graph API call succeeded"
        );
        Ok(entities)
    }
}

/// Unwrap `itemListElement[].result`, carrying each item's `resultScore` onto
/// the record. A missing list means no matches.
fn entities_from_payload(payload: Value) -> Result<Vec<RawEntity>, KgError> {
    let Value::Object(mut body) = payload else {
        return Err(KgError::Decode("response body must be a JSON object".to_string()));
    };

    let items = match body.remove("itemListElement") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(KgError::Decode(
                "'itemListElement' must be an array".to_string(),
            ));
        }
    };

    let mut entities = Vec::with_capacity(items.len());
    for item in items {
        let Value::Object(mut item) = item else {
            continue;
        };
        let Some(Value::Object(result)) = item.remove("result") else {
            continue;
        };
        let mut entity = RawEntity::from(result);
        if let Some(score) = item.remove("resultScore") {
            entity.insert_if_absent("resultScore", score);
        }
        entities.push(entity);
    }
    Ok(entities)
}
