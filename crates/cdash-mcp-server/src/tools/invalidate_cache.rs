use rmcp::model::{CallToolResult, Tool};
use rmcp::schemars::{self, JsonSchema};
use serde::Deserialize;
use serde_json::Value;

use crate::endpoint::Endpoint;
use crate::errors::{ExecuteError, McpError};
use crate::executor::{GraphQLExecutor, QueryRequest};
use crate::tools::{input_schema, resolve_endpoint, text_result};

/// The name of the tool to drop a single cached query response
pub const INVALIDATE_CACHE_TOOL_NAME: &str = "invalidate_cache";

#[derive(Clone)]
pub struct InvalidateCache {
    executor: GraphQLExecutor,
    default_endpoint: Endpoint,
    pub tool: Tool,
}

/// Input for the invalidate_cache tool.
#[derive(JsonSchema, Deserialize)]
pub struct Input {
    /// The GraphQL query whose cached response should be removed
    query: String,

    /// Base URL of the CDash instance the query was run against
    #[serde(default)]
    base_url: Option<String>,

    /// The variable values the query was run with
    #[serde(default)]
    variables: Option<Value>,
}

impl InvalidateCache {
    pub fn new(executor: GraphQLExecutor, default_endpoint: Endpoint) -> Self {
        Self {
            executor,
            default_endpoint,
            tool: Tool::new(
                INVALIDATE_CACHE_TOOL_NAME,
                "Remove the cached response of one query so its next run fetches fresh data",
                input_schema::<Input>(),
            ),
        }
    }

    pub async fn execute(&self, input: Input) -> Result<CallToolResult, McpError> {
        self.run(input)
            .await
            .or_else(ExecuteError::into_tool_result)
    }

    async fn run(&self, input: Input) -> Result<CallToolResult, ExecuteError> {
        let request = QueryRequest::builder()
            .query(input.query)
            .maybe_variables(input.variables)
            .endpoint(resolve_endpoint(
                input.base_url.as_deref(),
                &self.default_endpoint,
            )?)
            .build()?;

        let removed = self.executor.cache().invalidate(request.cache_key()).await;
        Ok(text_result(if removed {
            format!("Removed cached response from {}", request.endpoint())
        } else {
            format!("No cached response for this query from {}", request.endpoint())
        }))
    }
}
