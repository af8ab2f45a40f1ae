//! MCP tools exposed by the server

pub mod builds;
pub mod cache_stats;
pub mod clear_cache;
pub mod invalidate_cache;
pub mod projects;
pub mod query;
pub mod schema;

use rmcp::model::{CallToolResult, Content};
use rmcp::schemars::{self, JsonSchema};
use serde_json::{Map, Value};

use crate::endpoint::Endpoint;
use crate::errors::ExecuteError;

/// Generate the JSON schema of a tool's input
pub(crate) fn input_schema<T: JsonSchema>() -> Map<String, Value> {
    match serde_json::to_value(schemars::schema_for!(T)) {
        Ok(Value::Object(schema)) => schema,
        _ => Map::from_iter([("type".to_string(), Value::from("object"))]),
    }
}

/// Use the caller's base URL if given, otherwise the configured endpoint
pub(crate) fn resolve_endpoint(
    base_url: Option<&str>,
    default: &Endpoint,
) -> Result<Endpoint, ExecuteError> {
    match base_url.map(str::trim) {
        None | Some("") => Ok(default.clone()),
        Some(base_url) => Endpoint::parse(base_url),
    }
}

pub(crate) fn default_use_cache() -> bool {
    true
}

pub(crate) fn text_result(text: String) -> CallToolResult {
    CallToolResult {
        content: vec![Content::text(text)],
        is_error: None,
    }
}

pub(crate) fn error_result(text: String) -> CallToolResult {
    CallToolResult {
        content: vec![Content::text(text)],
        is_error: Some(true),
    }
}

/// Read a string field, treating null and missing alike
pub(crate) fn str_field<'a>(value: &'a Value, name: &str) -> Option<&'a str> {
    value
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Render a scalar field for display, whatever its JSON type
pub(crate) fn display_field(value: &Value, name: &str) -> Option<String> {
    match value.get(name)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
