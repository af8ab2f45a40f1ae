use rmcp::model::{CallToolResult, Tool};
use rmcp::schemars::{self, JsonSchema};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::Value;

use crate::endpoint::Endpoint;
use crate::errors::{ExecuteError, McpError};
use crate::executor::{GraphQLExecutor, QueryRequest};
use crate::tools::{
    default_use_cache, display_field, error_result, input_schema, resolve_endpoint, str_field,
    text_result,
};

/// The name of the tool to list the projects of a CDash instance
pub const LIST_PROJECTS_TOOL_NAME: &str = "list_projects";

pub const PROJECTS_QUERY: &str = r#"
query {
  projects {
    edges {
      node {
        id
        name
        description
        homeurl
        visibility
        buildCount
      }
    }
  }
}
"#;

#[derive(Clone)]
pub struct ListProjects {
    executor: GraphQLExecutor,
    default_endpoint: Endpoint,
    pub tool: Tool,
}

/// Input for the list_projects tool.
#[derive(JsonSchema, Deserialize)]
pub struct Input {
    /// Base URL of the CDash instance, e.g. https://open.cdash.org
    #[serde(default)]
    base_url: Option<String>,

    /// CDash API token
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    token: Option<SecretString>,

    /// Whether to serve the project list from the cache when possible
    #[serde(default = "default_use_cache")]
    use_cache: bool,
}

impl ListProjects {
    pub fn new(executor: GraphQLExecutor, default_endpoint: Endpoint) -> Self {
        Self {
            executor,
            default_endpoint,
            tool: Tool::new(
                LIST_PROJECTS_TOOL_NAME,
                "List the projects of a CDash instance with their description, build count, home URL and visibility",
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
        let request = QueryRequest::builder()
            .query(PROJECTS_QUERY.to_string())
            .endpoint(endpoint.clone())
            .use_cache(input.use_cache)
            .maybe_token(input.token)
            .build()?;
        let execution = self.executor.execute(request).await?;

        Ok(match projects(&execution.response) {
            None => error_result(format!(
                "Failed to retrieve projects from CDash at {endpoint}"
            )),
            Some(projects) if projects.is_empty() => {
                text_result(format!("No projects found in CDash at {endpoint}"))
            }
            Some(projects) => text_result(render_projects(&endpoint, &projects)),
        })
    }
}

/// The project nodes of a projects response
fn projects(response: &Value) -> Option<Vec<&Value>> {
    let edges = response
        .get("data")?
        .get("projects")?
        .get("edges")?
        .as_array()?;
    Some(edges.iter().filter_map(|edge| edge.get("node")).collect())
}

fn render_projects(endpoint: &Endpoint, projects: &[&Value]) -> String {
    let mut lines = vec![format!("# CDash Projects ({endpoint})"), String::new()];
    for project in projects {
        lines.push(format!(
            "## {}",
            str_field(project, "name").unwrap_or("Unnamed project")
        ));
        if let Some(description) = str_field(project, "description") {
            lines.push(format!("**Description:** {description}"));
        }
        lines.push(format!(
            "**Build Count:** {}",
            display_field(project, "buildCount").unwrap_or_else(|| "0".to_string())
        ));
        if let Some(home_url) = str_field(project, "homeurl") {
            lines.push(format!("**Home URL:** {home_url}"));
        }
        lines.push(format!(
            "**Visibility:** {}",
            display_field(project, "visibility").unwrap_or_else(|| "Unknown".to_string())
        ));
        if let Some(id) = display_field(project, "id") {
            lines.push(format!("**ID:** {id}"));
        }
        lines.push(String::new());
    }
    lines.join("\n")
}
