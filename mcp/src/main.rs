use std::sync::Arc;

use clap::Parser;
use kgraph_mcp_runtime::client::DEFAULT_API_BASE_URL;
use kgraph_mcp_runtime::{ClientConfig, KnowledgeGraphClient, McpServer, ToolRegistry, stdio};

#[derive(Parser)]
#[command(
    name = "kgraph-mcp",
    version,
    about = "Google Knowledge Graph MCP server over stdio"
)]
struct Cli {
    /// Google Knowledge Graph Search API key
    #[arg(long, env = "GOOGLE_KNOWLEDGE_GRAPH_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Knowledge Graph API base URL
    #[arg(long, env = "KG_API_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    api_url: String,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    // stdout carries protocol frames; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kgraph_mcp=info,kgraph_mcp_runtime=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let client = match KnowledgeGraphClient::new(
        ClientConfig::new(cli.api_key).with_base_url(cli.api_url),
    ) {
        Ok(client) => client,
        Err(err) => {
            tracing::error!(error = %err, "Invalid Knowledge Graph API URL");
            std::process::exit(2);
        }
    };
    let server = McpServer::new(Arc::new(ToolRegistry::new(client)));

    if let Err(err) = stdio::serve_stdio(&server).await {
        tracing::error!(error = %err, "MCP stdio server failed");
        std::process::exit(1);
    }
}
