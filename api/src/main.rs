use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use kgraph_mcp_runtime::{ClientConfig, KnowledgeGraphClient, ToolRegistry};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

mod config;
mod error;
mod middleware;
mod routes;
mod state;
mod transport;

#[cfg(test)]
mod test_support;

use config::{ServerConfig, TransportMode};
use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Google Knowledge Graph MCP",
        version = "0.1.0",
        description = "Knowledge Graph entity search and lookup for AI agents, over MCP and plain REST."
    ),
    paths(
        routes::health::health_check,
        routes::rest::search,
        routes::rest::lookup,
    ),
    components(schemas(
        HealthResponse,
        kgraph_core::error::ApiError,
        kgraph_core::SearchRequest,
        kgraph_core::LookupRequest,
        kgraph_core::ToolResult,
        kgraph_core::NormalizedEntity,
    ))
)]
struct ApiDoc;

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Full router: health, REST fallback, OpenAPI document and the selected
/// MCP transport, behind tracing and CORS.
fn app(state: AppState, mode: TransportMode) -> Router {
    Router::new()
        .route("/api-doc/openapi.json", get(openapi_json))
        .merge(routes::health::router())
        .merge(routes::rest::router())
        .merge(transport::router(mode))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::cors::build_cors_layer()),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kgraph_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(event = "config_invalid", error = %err, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let client = match KnowledgeGraphClient::new(
        ClientConfig::new(config.api_key.clone()).with_base_url(config.api_base_url.clone()),
    ) {
        Ok(client) => client,
        Err(err) => {
            tracing::error!(
                event = "config_invalid",
                error = %err,
                api_base_url = %config.api_base_url,
                "KG_API_BASE_URL is not a valid URL"
            );
            std::process::exit(1);
        }
    };

    let registry = Arc::new(ToolRegistry::new(client));
    let app_state = AppState::new(registry, config.json_response);
    let app = app(app_state, config.transport);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(event = "bind_failed", %addr, error = %err, "Failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!(
        event = "server_started",
        %addr,
        transport = %config.transport,
        json_response = config.json_response,
        "Knowledge Graph MCP server listening on {}",
        addr
    );

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!(event = "server_failed", error = %err, "Server exited with error");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::offline_state;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    #[tokio::test]
    async fn preflight_allows_any_origin_and_mcp_headers() {
        let response = app(offline_state(), TransportMode::Streamable)
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/mcp")
                    .header("origin", "https://inspector.example")
                    .header("access-control-request-method", "POST")
                    .header("access-control-request-headers", "content-type, mcp-session-id")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_success());
        let headers = response.headers();
        assert_eq!(headers["access-control-allow-origin"], "*");
        let methods = headers["access-control-allow-methods"].to_str().unwrap();
        assert!(methods.contains("GET") && methods.contains("POST"));
        let allowed = headers["access-control-allow-headers"]
            .to_str()
            .unwrap()
            .to_ascii_lowercase();
        assert!(allowed.contains("mcp-session-id"));
    }

    #[tokio::test]
    async fn streamable_response_exposes_session_header_to_browsers() {
        let response = app(offline_state(), TransportMode::Streamable)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/mcp")
                    .header("origin", "https://inspector.example")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert!(headers.contains_key("mcp-session-id"));
        assert_eq!(
            headers["access-control-expose-headers"]
                .to_str()
                .unwrap()
                .to_ascii_lowercase(),
            "mcp-session-id"
        );
    }

    #[tokio::test]
    async fn only_the_selected_transport_is_mounted() {
        let keyed = app(offline_state(), TransportMode::SseKeyed);
        let response = keyed
            .oneshot(Request::builder().method("POST").uri("/mcp").body(Body::from("{}")).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let streamable = app(offline_state(), TransportMode::Streamable);
        let response = streamable
            .oneshot(Request::builder().uri("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn openapi_document_lists_rest_routes() {
        let response = app(offline_state(), TransportMode::SseKeyed)
            .oneshot(
                Request::builder()
                    .uri("/api-doc/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(doc["paths"]["/api/search"]["post"].is_object());
        assert!(doc["paths"]["/api/lookup"]["post"].is_object());
        assert!(doc["paths"]["/health"]["get"].is_object());

        let schemas = &doc["components"]["schemas"];
        assert_eq!(schemas["SearchRequest"]["required"], json!(["query"]));
        assert_eq!(schemas["LookupRequest"]["required"], json!(["ids"]));
    }
}
