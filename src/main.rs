use std::process::ExitCode;

use openapi_mcp_server::api::ApiClient;
use openapi_mcp_server::config::RuntimeConfig;
use openapi_mcp_server::logging::setup_logging;
use openapi_mcp_server::mcp::OpenApiMcpServer;
use rmcp::transport::stdio;
use rmcp::ServiceExt;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // .env values never overwrite variables already present in the environment
    dotenvy::dotenv().ok();
    setup_logging();

    info!("starting OpenAPI MCP server");

    let config = match RuntimeConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };
    info!("configuration loaded");

    let client = match ApiClient::new(&config.base_url, config.auth_headers.clone()) {
        Ok(client) => client,
        Err(err) => {
            error!("failed to create HTTP client: {err}");
            return ExitCode::FAILURE;
        }
    };
    info!("HTTP client created for {}", client.base_url());

    let server = match OpenApiMcpServer::new(&config.schema, client) {
        Ok(server) => server,
        Err(err) => {
            error!("failed to build tool server: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = serve(server).await {
        error!("server terminated with error: {err:#}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

/// Run the blocking serve loop on the stdio transport.
async fn serve(server: OpenApiMcpServer) -> anyhow::Result<()> {
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}
