use rmcp::model::{CallToolResult, Content, Tool};
use rmcp::schemars::{self, JsonSchema};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::Value;

use crate::endpoint::Endpoint;
use crate::errors::{ExecuteError, McpError};
use crate::executor::{Execution, GraphQLExecutor, QueryRequest};
use crate::tools::{default_use_cache, input_schema, resolve_endpoint};

/// The name of the tool to run an ad hoc GraphQL query against CDash
pub const QUERY_TOOL_NAME: &str = "query";

#[derive(Clone)]
pub struct Query {
    executor: GraphQLExecutor,
    default_endpoint: Endpoint,
    pub tool: Tool,
}

/// Input for the query tool.
#[derive(JsonSchema, Deserialize)]
pub struct Input {
    /// The GraphQL query
    query: String,

    /// Base URL of the CDash instance, e.g. https://open.cdash.org
    #[serde(default)]
    base_url: Option<String>,

    /// The variable values represented as JSON
    #[serde(default)]
    variables: Option<Value>,

    /// Whether to serve the response from the cache when possible
    #[serde(default = "default_use_cache")]
    use_cache: bool,

    /// How long to cache a fresh response, in seconds
    #[serde(default)]
    cache_ttl: Option<i64>,

    /// CDash API token
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    token: Option<SecretString>,
}

impl Query {
    pub fn new(executor: GraphQLExecutor, default_endpoint: Endpoint) -> Self {
        let description = format!(
            "Run a GraphQL query against a CDash instance (default {default_endpoint}). Repeated queries are served from a cache; set `use_cache` to false to force a fresh fetch. Use the `get_schema` tool to discover the available types and fields."
        );
        Self {
            executor,
            default_endpoint,
            tool: Tool::new(QUERY_TOOL_NAME, description, input_schema::<Input>()),
        }
    }

    pub async fn execute(&self, input: Input) -> Result<CallToolResult, McpError> {
        match self.run(input).await {
            Ok((endpoint, execution)) => Ok(CallToolResult {
                content: vec![
                    Content::text(provenance(&endpoint, &execution)),
                    Content::json(&execution.response)
                        .unwrap_or(Content::text(execution.response.to_string())),
                ],
                is_error: None,
            }),
            Err(e) => e.into_tool_result(),
        }
    }

    async fn run(&self, input: Input) -> Result<(Endpoint, Execution), ExecuteError> {
        let endpoint = resolve_endpoint(input.base_url.as_deref(), &self.default_endpoint)?;
        let request = QueryRequest::builder()
            .query(input.query)
            .maybe_variables(input.variables)
            .endpoint(endpoint.clone())
            .use_cache(input.use_cache)
            .maybe_cache_ttl(input.cache_ttl)
            .maybe_token(input.token)
            .build()?;
        let execution = self.executor.execute(request).await?;
        Ok((endpoint, execution))
    }
}

fn provenance(endpoint: &Endpoint, execution: &Execution) -> String {
    if execution.cached {
        format!("Served from cache ({endpoint})")
    } else {
        format!("Fetched fresh from {endpoint}")
    }
}

#[cfg(test)]
mod tests {
    use rmcp::model::ErrorCode;
    use serde_json::json;

    use super::{Input, Query};
    use crate::endpoint::Endpoint;
    use crate::tools::test_support::{endpoint, executor, texts};

    fn input(value: serde_json::Value) -> Input {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn input_defaults() {
        let input = input(json!({ "query": "{ projects { edges { node { name } } } }" }));
        assert!(input.use_cache);
        assert!(input.base_url.is_none());
        assert!(input.variables.is_none());
        assert!(input.cache_ttl.is_none());
        assert!(input.token.is_none());
    }

    #[tokio::test]
    async fn it_reports_where_the_response_came_from() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(r#"{"data":{"projects":{"edges":[{"node":{"name":"CMake"}}]}}}"#)
            .expect(1)
            .create_async()
            .await;
        let tool = Query::new(executor(), endpoint(&server));
        let call = || input(json!({ "query": "{ projects { edges { node { name } } } }" }));

        let fresh = tool.execute(call()).await.unwrap();
        let cached = tool.execute(call()).await.unwrap();

        mock.assert_async().await;
        let url = server.url();
        assert_eq!(fresh.is_error, None);
        assert_eq!(
            texts(&fresh),
            vec![
                format!("Fetched fresh from {url}"),
                r#"{"data":{"projects":{"edges":[{"node":{"name":"CMake"}}]}}}"#.to_string()
            ]
        );
        assert_eq!(
            texts(&cached).first(),
            Some(&format!("Served from cache ({url})"))
        );
    }

    #[tokio::test]
    async fn graphql_errors_are_error_results() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(r#"{"data":null,"errors":[{"message":"Cannot query field \"nope\""}]}"#)
            .create_async()
            .await;
        let tool = Query::new(executor(), endpoint(&server));

        let result = tool
            .execute(input(json!({ "query": "{ nope }" })))
            .await
            .unwrap();

        assert_eq!(result.is_error, Some(true));
        assert_eq!(
            texts(&result),
            vec!["Upstream error: GraphQL errors: Cannot query field \"nope\"".to_string()]
        );
    }

    #[tokio::test]
    async fn invalid_arguments_are_invalid_params() {
        let tool = Query::new(executor(), Endpoint::default());

        for arguments in [
            json!({ "query": "" }),
            json!({ "query": "{ a }", "base_url": "not a url" }),
            json!({ "query": "{ a }", "variables": [1, 2] }),
            json!({ "query": "{ a }", "cache_ttl": 0 }),
        ] {
            let error = tool.execute(input(arguments)).await.unwrap_err();
            assert_eq!(error.code, ErrorCode::INVALID_PARAMS);
        }
    }
}
