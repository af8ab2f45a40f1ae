use rmcp::model::{
    CallToolRequestParam, CallToolResult, ErrorCode, Implementation, ListToolsResult,
    PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use rmcp::{RoleServer, ServerHandler};
use serde_json::{Map, Value};
use tracing::debug;

use crate::endpoint::Endpoint;
use crate::errors::McpError;
use crate::executor::GraphQLExecutor;
use crate::tools::builds::{LIST_BUILDS_TOOL_NAME, ListBuilds};
use crate::tools::cache_stats::{CACHE_STATS_TOOL_NAME, CacheStats};
use crate::tools::clear_cache::{CLEAR_CACHE_TOOL_NAME, ClearCache};
use crate::tools::invalidate_cache::{INVALIDATE_CACHE_TOOL_NAME, InvalidateCache};
use crate::tools::projects::{LIST_PROJECTS_TOOL_NAME, ListProjects};
use crate::tools::query::{QUERY_TOOL_NAME, Query};
use crate::tools::schema::{GET_SCHEMA_TOOL_NAME, GetSchema};

#[derive(Clone)]
pub(super) struct Running {
    query_tool: Query,
    get_schema_tool: GetSchema,
    list_projects_tool: ListProjects,
    list_builds_tool: ListBuilds,
    cache_stats_tool: CacheStats,
    clear_cache_tool: ClearCache,
    invalidate_cache_tool: InvalidateCache,
    default_endpoint: Endpoint,
}

impl Running {
    pub(super) fn new(executor: GraphQLExecutor, default_endpoint: Endpoint) -> Self {
        let cache = executor.cache().clone();
        Self {
            query_tool: Query::new(executor.clone(), default_endpoint.clone()),
            get_schema_tool: GetSchema::new(executor.clone(), default_endpoint.clone()),
            list_projects_tool: ListProjects::new(executor.clone(), default_endpoint.clone()),
            list_builds_tool: ListBuilds::new(executor.clone(), default_endpoint.clone()),
            cache_stats_tool: CacheStats::new(cache.clone()),
            clear_cache_tool: ClearCache::new(cache),
            invalidate_cache_tool: InvalidateCache::new(executor, default_endpoint.clone()),
            default_endpoint,
        }
    }

    fn tools(&self) -> Vec<Tool> {
        vec![
            self.query_tool.tool.clone(),
            self.get_schema_tool.tool.clone(),
            self.list_projects_tool.tool.clone(),
            self.list_builds_tool.tool.clone(),
            self.cache_stats_tool.tool.clone(),
            self.clear_cache_tool.tool.clone(),
            self.invalidate_cache_tool.tool.clone(),
        ]
    }

    async fn dispatch(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<CallToolResult, McpError> {
        debug!(tool = name, "calling tool");
        match name {
            QUERY_TOOL_NAME => self.query_tool.execute(convert_arguments(arguments)?).await,
            GET_SCHEMA_TOOL_NAME => {
                self.get_schema_tool
                    .execute(convert_arguments(arguments)?)
                    .await
            }
            LIST_PROJECTS_TOOL_NAME => {
                self.list_projects_tool
                    .execute(convert_arguments(arguments)?)
                    .await
            }
            LIST_BUILDS_TOOL_NAME => {
                self.list_builds_tool
                    .execute(convert_arguments(arguments)?)
                    .await
            }
            CACHE_STATS_TOOL_NAME => {
                self.cache_stats_tool
                    .execute(convert_arguments(arguments)?)
                    .await
            }
            CLEAR_CACHE_TOOL_NAME => {
                self.clear_cache_tool
                    .execute(convert_arguments(arguments)?)
                    .await
            }
            INVALIDATE_CACHE_TOOL_NAME => {
                self.invalidate_cache_tool
                    .execute(convert_arguments(arguments)?)
                    .await
            }
            _ => Err(tool_not_found(name)),
        }
    }
}

impl ServerHandler for Running {
    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(&request.name, request.arguments).await
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            next_cursor: None,
            tools: self.tools(),
        })
    }

    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(format!(
                "Query CDash dashboards over GraphQL. Tools default to {} when `base_url` is omitted. Responses are cached; use `cache_stats`, `invalidate_cache` and `clear_cache` to manage the cache.",
                self.default_endpoint
            )),
            ..Default::default()
        }
    }
}

fn tool_not_found(name: &str) -> McpError {
    McpError::new(
        ErrorCode::METHOD_NOT_FOUND,
        format!("Tool {name} not found"),
        None,
    )
}

/// Deserialize tool arguments, treating missing arguments as an empty object
fn convert_arguments<T: serde::de::DeserializeOwned>(
    arguments: Option<Map<String, Value>>,
) -> Result<T, McpError> {
    serde_json::from_value(Value::Object(arguments.unwrap_or_default())).map_err(|e| {
        McpError::new(
            ErrorCode::INVALID_PARAMS,
            format!("Invalid input: {e}"),
            None,
        )
    })
}
