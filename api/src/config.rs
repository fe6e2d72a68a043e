use std::fmt;
use std::str::FromStr;

use kgraph_mcp_runtime::client::DEFAULT_API_BASE_URL;

pub const DEFAULT_PORT: u16 = 3000;

/// Which HTTP transport variant serves MCP. Exactly one is mounted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransportMode {
    /// `GET /sse` + `POST /message/{id}`, one server instance per session
    #[default]
    SseKeyed,
    /// `GET /sse` + `POST /message`, last connection wins
    SseSingle,
    /// `/mcp` on any method, one shared server instance
    Streamable,
}

impl TransportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SseKeyed => "sse-keyed",
            Self::SseSingle => "sse-single",
            Self::Streamable => "streamable",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sse-keyed" | "keyed" | "sse" => Ok(Self::SseKeyed),
            "sse-single" | "single" => Ok(Self::SseSingle),
            "streamable" | "streamable-http" | "http" => Ok(Self::Streamable),
            other => Err(ConfigError::InvalidTransport(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("GOOGLE_KNOWLEDGE_GRAPH_API_KEY environment variable is required")]
    MissingApiKey,
    #[error("PORT must be a number between 0 and 65535, got '{0}'")]
    InvalidPort(String),
    #[error("MCP_TRANSPORT must be one of sse-keyed, sse-single, streamable; got '{0}'")]
    InvalidTransport(String),
    #[error("MCP_JSON_RESPONSE must be true or false, got '{0}'")]
    InvalidFlag(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub api_key: String,
    pub api_base_url: String,
    pub port: u16,
    pub transport: TransportMode,
    pub json_response: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let api_key = var("GOOGLE_KNOWLEDGE_GRAPH_API_KEY").ok_or(ConfigError::MissingApiKey)?;

        let port = match var("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };

        let transport = match var("MCP_TRANSPORT") {
            Some(raw) => raw.parse()?,
            None => TransportMode::default(),
        };

        let json_response = match var("MCP_JSON_RESPONSE") {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => return Err(ConfigError::InvalidFlag(raw)),
            },
            None => false,
        };

        Ok(Self {
            api_key,
            api_base_url: var("KG_API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            port,
            transport,
            json_response,
        })
    }
}
