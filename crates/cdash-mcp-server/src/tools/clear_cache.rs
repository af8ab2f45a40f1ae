use std::sync::Arc;

use rmcp::model::{CallToolResult, Tool};
use rmcp::schemars::{self, JsonSchema};
use serde::Deserialize;
use tracing::info;

use crate::cache::QueryCache;
use crate::errors::McpError;
use crate::tools::{input_schema, text_result};

/// The name of the tool to empty the query cache
pub const CLEAR_CACHE_TOOL_NAME: &str = "clear_cache";

#[derive(Clone)]
pub struct ClearCache {
    cache: Arc<QueryCache>,
    pub tool: Tool,
}

/// Input for the clear_cache tool.
#[derive(JsonSchema, Deserialize)]
pub struct Input {}

impl ClearCache {
    pub fn new(cache: Arc<QueryCache>) -> Self {
        Self {
            cache,
            tool: Tool::new(
                CLEAR_CACHE_TOOL_NAME,
                "Remove every cached query response so subsequent queries fetch fresh data",
                input_schema::<Input>(),
            ),
        }
    }

    pub async fn execute(&self, _input: Input) -> Result<CallToolResult, McpError> {
        self.cache.clear().await;
        info!("query cache cleared by client request");
        Ok(text_result("Cache cleared".to_string()))
    }
}
