use rmcp::model::{CallToolResult, Tool};
use rmcp::schemars::{self, JsonSchema};
use serde::Deserialize;
use serde_json::Value;

use crate::endpoint::Endpoint;
use crate::errors::{ExecuteError, McpError};
use crate::executor::GraphQLExecutor;
use crate::tools::{
    default_use_cache, error_result, input_schema, resolve_endpoint, str_field, text_result,
};

/// The name of the tool to describe a CDash GraphQL schema
pub const GET_SCHEMA_TOOL_NAME: &str = "get_schema";

/// Fields listed per type before the rest are summarized
const MAX_FIELDS: usize = 10;

#[derive(Clone)]
pub struct GetSchema {
    executor: GraphQLExecutor,
    default_endpoint: Endpoint,
    pub tool: Tool,
}

/// Input for the get_schema tool.
#[derive(JsonSchema, Deserialize)]
pub struct Input {
    /// Base URL of the CDash instance, e.g. https://open.cdash.org
    #[serde(default)]
    base_url: Option<String>,

    /// Whether to serve the schema from the cache when possible
    #[serde(default = "default_use_cache")]
    use_cache: bool,
}

impl GetSchema {
    pub fn new(executor: GraphQLExecutor, default_endpoint: Endpoint) -> Self {
        Self {
            executor,
            default_endpoint,
            tool: Tool::new(
                GET_SCHEMA_TOOL_NAME,
                "Get the types and fields of a CDash instance's GraphQL schema. Use this before writing queries for the `query` tool.",
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
        let endpoint = resolve_endpoint(input.base_url.as_deref(), &self.default_endpoint)?;
        let execution = self
            .executor
            .introspect(endpoint.clone(), input.use_cache)
            .await?;
        Ok(match render_schema(&endpoint, &execution.response) {
            Some(markdown) => text_result(markdown),
            None => error_result(format!(
                "Schema introspection returned no types from {endpoint}"
            )),
        })
    }
}

/// Render an introspection response as Markdown
fn render_schema(endpoint: &Endpoint, response: &Value) -> Option<String> {
    let schema = response.get("data")?.get("__schema")?;
    let types = schema.get("types")?.as_array()?;

    let mut sections = vec![format!("# CDash GraphQL Schema ({endpoint})")];
    if let Some(query_type) = schema.get("queryType").and_then(|t| str_field(t, "name")) {
        sections.push(format!("Query type: **{query_type}**"));
    }
    if let Some(mutation_type) = schema.get("mutationType").and_then(|t| str_field(t, "name")) {
        sections.push(format!("Mutation type: **{mutation_type}**"));
    }
    sections.extend(types.iter().filter_map(render_type));
    Some(sections.join("\n\n"))
}

/// Render a single type, skipping introspection's own `__` types
fn render_type(schema_type: &Value) -> Option<String> {
    let name = str_field(schema_type, "name").unwrap_or("Unknown");
    if name.starts_with("__") {
        return None;
    }
    let kind = str_field(schema_type, "kind").unwrap_or("OBJECT");

    let mut lines = vec![format!("**{name}** ({kind})")];
    if let Some(description) = str_field(schema_type, "description") {
        lines.push(format!("  {description}"));
    }

    let fields = schema_type
        .get("fields")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    if !fields.is_empty() {
        lines.push("  Fields:".to_string());
        lines.extend(fields.iter().take(MAX_FIELDS).map(|field| {
            format!(
                "    - {}: {}",
                str_field(field, "name").unwrap_or("unknown"),
                str_field(field, "description").unwrap_or("No description")
            )
        }));
        if fields.len() > MAX_FIELDS {
            lines.push(format!(
                "    ... and {} more fields",
                fields.len() - MAX_FIELDS
            ));
        }
    }
    Some(lines.join("\n"))
}
