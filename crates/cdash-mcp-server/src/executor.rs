//! Cache-aware GraphQL execution

use std::sync::Arc;
use std::time::Duration;

use bon::bon;
use secrecy::SecretString;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::cache::{CacheKey, QueryCache};
use crate::endpoint::Endpoint;
use crate::errors::{ExecuteError, UpstreamError};
use crate::graphql::{self, HttpUpstream, Upstream, graphql_errors};

/// Query used to fetch the type list of a CDash GraphQL schema
pub const INTROSPECTION_QUERY: &str = r#"
query IntrospectSchema {
  __schema {
    queryType { name }
    mutationType { name }
    types {
      kind
      name
      description
      fields {
        name
        description
      }
    }
  }
}
"#;

/// A validated request to run a GraphQL query
#[derive(Debug)]
pub struct QueryRequest {
    query: String,
    variables: Map<String, Value>,
    endpoint: Endpoint,
    use_cache: bool,
    cache_ttl: Option<Duration>,
    token: Option<SecretString>,
    key: CacheKey,
}

#[bon]
impl QueryRequest {
    #[builder]
    pub fn new(
        query: String,
        variables: Option<Value>,
        endpoint: Endpoint,
        #[builder(default = true)] use_cache: bool,
        cache_ttl: Option<i64>,
        token: Option<SecretString>,
    ) -> Result<Self, ExecuteError> {
        if query.trim().is_empty() {
            return Err(ExecuteError::InvalidInput(
                "query must not be empty".to_string(),
            ));
        }

        let cache_ttl = match cache_ttl {
            None => None,
            Some(seconds) => match u64::try_from(seconds) {
                Ok(seconds) if seconds > 0 => Some(Duration::from_secs(seconds)),
                _ => {
                    return Err(ExecuteError::InvalidInput(format!(
                        "cache_ttl must be a positive number of seconds, got {seconds}"
                    )));
                }
            },
        };

        let variables = variables_object(variables)?;
        let key = CacheKey::new(&query, &variables, &endpoint).map_err(|e| {
            ExecuteError::InvalidInput(format!("variables cannot be fingerprinted: {e}"))
        })?;

        Ok(Self {
            query,
            variables,
            endpoint,
            use_cache,
            cache_ttl,
            token,
            key,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The fingerprint this request is cached under
    pub fn cache_key(&self) -> &CacheKey {
        &self.key
    }
}

/// Accept variables as a JSON object, a JSON-encoded object string, or nothing
fn variables_object(variables: Option<Value>) -> Result<Map<String, Value>, ExecuteError> {
    match variables {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(variables)) => Ok(variables),
        Some(Value::String(encoded)) if encoded.trim().is_empty() => Ok(Map::new()),
        Some(Value::String(encoded)) => match serde_json::from_str::<Value>(&encoded) {
            Ok(decoded @ (Value::Object(_) | Value::Null)) => variables_object(Some(decoded)),
            Ok(_) => Err(ExecuteError::InvalidInput(
                "variables must be a JSON object".to_string(),
            )),
            Err(e) => Err(ExecuteError::InvalidInput(format!(
                "variables are not valid JSON: {e}"
            ))),
        },
        Some(_) => Err(ExecuteError::InvalidInput(
            "variables must be a JSON object".to_string(),
        )),
    }
}

/// The outcome of a successful execution
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    /// The decoded GraphQL response
    pub response: Value,

    /// Whether the response was served from the cache
    pub cached: bool,
}

/// Runs GraphQL queries against CDash, serving repeated queries from a shared cache
#[derive(Debug, Clone)]
pub struct GraphQLExecutor<U = HttpUpstream> {
    cache: Arc<QueryCache>,
    upstream: U,
}

impl<U: Upstream> GraphQLExecutor<U> {
    pub fn new(cache: Arc<QueryCache>, upstream: U) -> Self {
        Self { cache, upstream }
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub async fn execute(&self, request: QueryRequest) -> Result<Execution, ExecuteError> {
        if !request.use_cache {
            debug!(endpoint = %request.endpoint, "cache bypassed");
            return Ok(Execution {
                response: self.fetch(&request).await?,
                cached: false,
            });
        }

        let key = request.cache_key();
        if let Some(response) = self.cache.get(key).await {
            return Ok(Execution {
                response,
                cached: true,
            });
        }

        // The cache lock is not held while the request is in flight
        let response = self.fetch(&request).await?;
        self.cache
            .put(key.clone(), response.clone(), request.cache_ttl)
            .await?;
        Ok(Execution {
            response,
            cached: false,
        })
    }

    /// Fetch the schema's type list from a CDash instance
    pub async fn introspect(
        &self,
        endpoint: Endpoint,
        use_cache: bool,
    ) -> Result<Execution, ExecuteError> {
        let request = QueryRequest::builder()
            .query(INTROSPECTION_QUERY.to_string())
            .endpoint(endpoint)
            .use_cache(use_cache)
            .build()?;
        self.execute(request).await
    }

    async fn fetch(&self, request: &QueryRequest) -> Result<Value, ExecuteError> {
        let response = self
            .upstream
            .send(graphql::Request {
                endpoint: &request.endpoint,
                query: &request.query,
                variables: &request.variables,
                token: request.token.as_ref(),
            })
            .await?;

        if let Some(messages) = graphql_errors(&response) {
            warn!(
                endpoint = %request.endpoint,
                errors = messages.len(),
                "GraphQL response reported errors"
            );
            return Err(UpstreamError::GraphQL(messages).into());
        }
        if response.get("data").is_none() {
            warn!(endpoint = %request.endpoint, "GraphQL response has no data");
            return Err(UpstreamError::InvalidBody("response has no data field".to_string()).into());
        }
        Ok(response)
    }
}
