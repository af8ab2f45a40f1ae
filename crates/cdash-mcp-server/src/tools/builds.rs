use rmcp::model::{CallToolResult, Tool};
use rmcp::schemars::{self, JsonSchema};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::endpoint::Endpoint;
use crate::errors::{ExecuteError, McpError};
use crate::executor::{GraphQLExecutor, QueryRequest};
use crate::tools::{
    default_use_cache, display_field, error_result, input_schema, resolve_endpoint, str_field,
    text_result,
};

/// The name of the tool to list the builds of a CDash project
pub const LIST_BUILDS_TOOL_NAME: &str = "list_builds";

pub const BUILDS_QUERY: &str = r#"
query GetBuilds($projectName: String!, $first: Int) {
  project(name: $projectName) {
    builds(first: $first) {
      edges {
        node {
          id
          name
          stamp
          startTime
          endTime
          failedTestsCount
          passedTestsCount
          site {
            name
          }
        }
      }
    }
  }
}
"#;

#[derive(Clone)]
pub struct ListBuilds {
    executor: GraphQLExecutor,
    default_endpoint: Endpoint,
    pub tool: Tool,
}

/// Input for the list_builds tool.
#[derive(JsonSchema, Deserialize)]
pub struct Input {
    /// Name of the CDash project, e.g. "Spack Testing"
    project_name: String,

    /// Base URL of the CDash instance, e.g. https://open.cdash.org
    #[serde(default)]
    base_url: Option<String>,

    /// CDash API token
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    token: Option<SecretString>,

    /// Maximum number of builds to return. Defaults to 50.
    #[serde(default = "default_limit")]
    limit: u32,

    /// Whether to serve the build list from the cache when possible
    #[serde(default = "default_use_cache")]
    use_cache: bool,
}

fn default_limit() -> u32 {
    50
}

impl ListBuilds {
    pub fn new(executor: GraphQLExecutor, default_endpoint: Endpoint) -> Self {
        Self {
            executor,
            default_endpoint,
            tool: Tool::new(
                LIST_BUILDS_TOOL_NAME,
                "List the builds of a CDash project with their site, start and end times, and test results",
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
        let project_name = input.project_name.trim();
        if project_name.is_empty() {
            return Err(ExecuteError::InvalidInput(
                "project_name must not be empty".to_string(),
            ));
        }
        if input.limit == 0 {
            return Err(ExecuteError::InvalidInput(
                "limit must be greater than zero".to_string(),
            ));
        }

        let endpoint = resolve_endpoint(input.base_url.as_deref(), &self.default_endpoint)?;
        let request = QueryRequest::builder()
            .query(BUILDS_QUERY.to_string())
            .variables(json!({ "projectName": project_name, "first": input.limit }))
            .endpoint(endpoint.clone())
            .use_cache(input.use_cache)
            .maybe_token(input.token)
            .build()?;
        let execution = self.executor.execute(request).await?;

        Ok(match builds(&execution.response) {
            None => error_result(format!(
                "Failed to retrieve builds for project '{project_name}' from {endpoint}. Project may not exist."
            )),
            Some(builds) if builds.is_empty() => text_result(format!(
                "No builds found for project '{project_name}' at {endpoint}"
            )),
            Some(builds) => text_result(render_builds(
                &endpoint,
                project_name,
                input.limit,
                &builds,
            )),
        })
    }
}

/// The build nodes of a builds response, or `None` when the project is missing
fn builds(response: &Value) -> Option<Vec<&Value>> {
    let project = response.get("data")?.get("project")?;
    if project.is_null() {
        return None;
    }
    Some(
        project
            .get("builds")
            .and_then(|builds| builds.get("edges"))
            .and_then(Value::as_array)
            .map(|edges| edges.iter().filter_map(|edge| edge.get("node")).collect())
            .unwrap_or_default(),
    )
}

fn render_builds(endpoint: &Endpoint, project_name: &str, limit: u32, builds: &[&Value]) -> String {
    let mut lines = vec![
        format!("# Builds for Project: {project_name} ({endpoint})"),
        String::new(),
        format!("Showing {} builds (limit: {limit})", builds.len()),
        String::new(),
    ];
    let not_available = || "N/A".to_string();

    for (i, build) in builds.iter().enumerate() {
        let failed = build
            .get("failedTestsCount")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let passed = build
            .get("passedTestsCount")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let (status, marker) = if failed > 0 {
            ("FAILED", "❌")
        } else {
            ("PASSED", "✅")
        };

        lines.push(format!(
            "## Build {}: {} {marker}",
            i + 1,
            str_field(build, "name").unwrap_or("Unnamed build")
        ));
        lines.push(format!("**Status:** {status}"));
        lines.push(format!(
            "**ID:** {}",
            display_field(build, "id").unwrap_or_else(not_available)
        ));
        lines.push(format!(
            "**Site:** {}",
            build
                .get("site")
                .and_then(|site| str_field(site, "name"))
                .unwrap_or("N/A")
        ));
        lines.push(format!(
            "**Stamp:** {}",
            display_field(build, "stamp").unwrap_or_else(not_available)
        ));
        lines.push(format!(
            "**Start Time:** {}",
            display_field(build, "startTime").unwrap_or_else(not_available)
        ));
        lines.push(format!(
            "**End Time:** {}",
            display_field(build, "endTime").unwrap_or_else(not_available)
        ));
        lines.push(format!("**Failed Tests:** {failed}"));
        lines.push(format!("**Passed Tests:** {passed}"));
        lines.push(String::new());
    }
    lines.join("\n")
}
