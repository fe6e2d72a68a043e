use thiserror::Error;

/// Failures talking to the Knowledge Graph API. Surfaced verbatim, never retried.
#[derive(Debug, Error)]
pub enum KgError {
    /// Backend answered with a non-success status
    #[error("Knowledge Graph API error: {status} {body}")]
    Upstream { status: u16, body: String },
    /// The HTTP call itself could not complete
    #[error("Failed to reach Knowledge Graph API: {0}")]
    Transport(#[source] reqwest::Error),
    /// Success status but the body was not the expected JSON
    #[error("Invalid Knowledge Graph API response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for KgError {
    fn from(err: reqwest::Error) -> Self {
        // Request URLs carry the API key; keep them out of messages.
        KgError::Transport(err.without_url())
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    /// Missing or malformed tool arguments; no upstream call was made
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
    },
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error(transparent)]
    Upstream(#[from] KgError),
}

impl ToolError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ToolError::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Argument a validation failure is about.
    pub fn field(&self) -> Option<&str> {
        match self {
            ToolError::Validation { field, .. } => field.as_deref(),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ToolError::Validation { .. })
    }
}
