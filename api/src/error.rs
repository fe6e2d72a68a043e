use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kgraph_core::error::ApiError;
use kgraph_mcp_runtime::ToolError;

/// Internal error type that converts to `{error}` JSON responses
#[derive(Debug)]
pub enum AppError {
    /// Caller-supplied input was rejected (400)
    Validation(String),
    /// The id in the message path is not a live session (404)
    SessionNotFound,
    /// Upstream or internal failure (500)
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            AppError::SessionNotFound => (
                StatusCode::NOT_FOUND,
                kgraph_core::error::messages::SESSION_NOT_FOUND.to_string(),
            ),
            AppError::Internal(message) => {
                tracing::error!(event = "request_failed", error = %message, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };

        (status, Json(ApiError::new(message))).into_response()
    }
}

impl From<ToolError> for AppError {
    fn from(err: ToolError) -> Self {
        if err.is_validation() {
            AppError::Validation(err.to_string())
        } else {
            AppError::Internal(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgraph_mcp_runtime::KgError;

    #[test]
    fn tool_errors_map_to_status_codes() {
        let validation: AppError = ToolError::validation("ids", "ids array is required").into();
        assert_eq!(validation.into_response().status(), StatusCode::BAD_REQUEST);

        let upstream: AppError = ToolError::from(KgError::Upstream {
            status: 403,
            body: "forbidden".to_string(),
        })
        .into();
        assert_eq!(
            upstream.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        assert_eq!(
            AppError::SessionNotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
    }
}
