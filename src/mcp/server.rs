use std::sync::Arc;

use rmcp::model::*;
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{ErrorData as McpError, ServerHandler};
use serde_json::Value;
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::mcp::tools::{CatalogError, ToolCatalog};

/// MCP server exposing every operation of an OpenAPI document as a tool.
#[derive(Clone)]
pub struct OpenApiMcpServer {
    catalog: Arc<ToolCatalog>,
    client: Arc<ApiClient>,
}

impl OpenApiMcpServer {
    /// Build the tool catalog from the schema document and take ownership of
    /// the HTTP client that tool calls execute on.
    pub fn new(schema: &Value, client: ApiClient) -> Result<Self, CatalogError> {
        let catalog = ToolCatalog::from_schema(schema)?;
        info!(
            "discovered {} tool(s) from the OpenAPI schema",
            catalog.len()
        );

        Ok(Self {
            catalog: Arc::new(catalog),
            client: Arc::new(client),
        })
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }
}

impl ServerHandler for OpenApiMcpServer {
    fn get_info(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: None }),
                ..Default::default()
            },
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Exposes each operation of the configured OpenAPI schema as a callable tool. \
                 Calls are proxied to the upstream API with the configured credentials."
                    .into(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            next_cursor: None,
            tools: self.catalog.tools(),
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let spec = self.catalog.get(&request.name).ok_or_else(|| {
            McpError::invalid_params(format!("unknown tool '{}'", request.name), None)
        })?;

        let args = request.arguments.unwrap_or_default();
        let bound = spec
            .bind(&args)
            .map_err(|e| McpError::invalid_params(e.to_string(), None))?;

        debug!(
            tool = %request.name,
            method = %bound.method,
            path = %bound.path,
            "executing tool call"
        );

        let response = self
            .client
            .request(bound.method, &bound.path, &bound.query, bound.headers, bound.body)
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        let text = serde_json::to_string_pretty(&response)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}
