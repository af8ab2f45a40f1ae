use std::sync::Arc;

use rmcp::model::{CallToolResult, Content, Tool};
use rmcp::schemars::{self, JsonSchema};
use serde::Deserialize;

use crate::cache::QueryCache;
use crate::errors::McpError;
use crate::tools::input_schema;

/// The name of the tool to report query cache statistics
pub const CACHE_STATS_TOOL_NAME: &str = "cache_stats";

#[derive(Clone)]
pub struct CacheStats {
    cache: Arc<QueryCache>,
    pub tool: Tool,
}

/// Input for the cache_stats tool.
#[derive(JsonSchema, Deserialize)]
pub struct Input {}

impl CacheStats {
    pub fn new(cache: Arc<QueryCache>) -> Self {
        Self {
            cache,
            tool: Tool::new(
                CACHE_STATS_TOOL_NAME,
                "Report the size, capacity, expired entry count, default TTL (seconds), hits and misses of the query cache",
                input_schema::<Input>(),
            ),
        }
    }

    pub async fn execute(&self, _input: Input) -> Result<CallToolResult, McpError> {
        let stats = self.cache.stats().await;
        Ok(CallToolResult {
            content: vec![Content::json(&stats)?],
            is_error: None,
        })
    }
}
