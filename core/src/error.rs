use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body returned by the REST fallback routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Human/agent-readable description of what went wrong
    pub error: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Fixed messages shared by the tool and REST surfaces
pub mod messages {
    pub const IDS_REQUIRED: &str = "ids array is required";
    pub const SESSION_NOT_FOUND: &str = "Session not found";
}
