//! The MCP server wiring the tools together.

use rmcp::model::{
    CallToolRequestParam, CallToolResult, ErrorCode, Implementation, ListToolsResult,
    PaginatedRequestParam, ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{RoleServer, ServerHandler};

use crate::errors::McpError;
use crate::graphql::GraphQLClient;
use crate::runtime::Config;
use crate::tools::batch_query::{BATCH_QUERY_TOOL_NAME, BatchQuery};
use crate::tools::query::{QUERY_TOOL_NAME, Query};
use crate::tools::search_entity::{SEARCH_ENTITY_TOOL_NAME, SearchEntity};

/// An MCP server for the Open Targets Platform GraphQL API.
#[derive(Clone)]
pub struct OpenTargetsServer {
    query_tool: Query,
    batch_query_tool: BatchQuery,
    search_entity_tool: SearchEntity,
}

impl OpenTargetsServer {
    pub fn new(config: &Config) -> Self {
        let client = GraphQLClient::new(config.endpoint.clone(), config.timeout);
        Self {
            query_tool: Query::new(client.clone(), config.filters.enabled),
            batch_query_tool: BatchQuery::new(
                client.clone(),
                config.batch.concurrency,
                config.filters.enabled,
            ),
            search_entity_tool: SearchEntity::new(client),
        }
    }
}

impl ServerHandler for OpenTargetsServer {
    #[tracing::instrument(skip_all, fields(tool_name = request.name.as_ref()))]
    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let arguments = request.arguments.as_ref();
        match request.name.as_ref() {
            QUERY_TOOL_NAME => self.query_tool.execute(arguments).await,
            BATCH_QUERY_TOOL_NAME => self.batch_query_tool.execute(arguments).await,
            SEARCH_ENTITY_TOOL_NAME => self.search_entity_tool.execute(arguments).await,
            other => Err(McpError::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("Tool {other} not found"),
                None,
            )),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            meta: None,
            next_cursor: None,
            tools: vec![
                self.query_tool.tool.clone(),
                self.batch_query_tool.tool.clone(),
                self.search_entity_tool.tool.clone(),
            ],
        })
    }

    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Query the Open Targets Platform GraphQL API. Use `search_entity` to map \
                 free-text names to canonical identifiers, `query` to execute a GraphQL \
                 operation, and `batch_query` to run one operation over many variable sets."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "Open Targets MCP Server".to_string(),
                description: None,
                icons: None,
                title: Some("Open Targets MCP Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                website_url: Some("https://platform.opentargets.org".to_string()),
            },
            ..Default::default()
        }
    }
}
