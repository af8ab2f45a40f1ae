//! Send GraphQL requests to a CDash instance

use std::future::Future;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret as _, SecretString};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::endpoint::Endpoint;
use crate::errors::{ExecuteError, TransportError, UpstreamError};

/// Header some CDash deployments read the API token from
const API_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-api-token");

/// A single GraphQL request
pub struct Request<'a> {
    pub endpoint: &'a Endpoint,
    pub query: &'a str,
    pub variables: &'a Map<String, Value>,
    pub token: Option<&'a SecretString>,
}

impl Request<'_> {
    /// The JSON body to post. Variables are left out when there are none.
    pub fn body(&self) -> Value {
        let mut body = json!({ "query": self.query });
        if !self.variables.is_empty() {
            if let Some(obj) = body.as_object_mut() {
                obj.insert(
                    "variables".to_string(),
                    Value::Object(self.variables.clone()),
                );
            }
        }
        body
    }

    /// Headers carrying the caller's token, passed through unmodified
    fn headers(&self) -> Result<HeaderMap, ExecuteError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = self.token {
            let token = token.expose_secret();
            let invalid =
                |_| ExecuteError::InvalidInput("token is not a valid header value".into());
            let mut bearer = HeaderValue::from_str(&format!("Bearer {token}")).map_err(invalid)?;
            bearer.set_sensitive(true);
            let mut api_token = HeaderValue::from_str(token).map_err(invalid)?;
            api_token.set_sensitive(true);
            headers.insert(AUTHORIZATION, bearer);
            headers.insert(API_TOKEN_HEADER, api_token);
        }
        Ok(headers)
    }
}

/// A transport able to send a GraphQL request and return the decoded body of
/// a successful HTTP response.
///
/// Implementations report transport failures and non-2xx statuses. GraphQL
/// `errors` in a 2xx body are left for the caller to interpret.
pub trait Upstream: Send + Sync {
    fn send(
        &self,
        request: Request<'_>,
    ) -> impl Future<Output = Result<Value, ExecuteError>> + Send;
}

/// Sends GraphQL requests over HTTP
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpUpstream {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .user_agent(concat!("cdash-mcp-server/", env!("CARGO_PKG_VERSION")))
                .build()?,
            timeout,
        })
    }

    fn transport_error(&self, error: reqwest::Error) -> ExecuteError {
        if error.is_timeout() {
            TransportError::Timeout(self.timeout).into()
        } else {
            TransportError::Request(error.to_string()).into()
        }
    }
}

impl Upstream for HttpUpstream {
    async fn send(&self, request: Request<'_>) -> Result<Value, ExecuteError> {
        let url = request.endpoint.graphql_url();
        debug!(%url, "sending GraphQL request");

        let response = self
            .client
            .post(&url)
            .headers(request.headers()?)
            .body(request.body().to_string())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
            warn!(%url, %status, "GraphQL request failed");
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                self.transport_error(e)
            } else {
                UpstreamError::InvalidBody(e.to_string()).into()
            }
        })
    }
}

/// Extract GraphQL error messages from a response body, if it reports any
pub fn graphql_errors(body: &Value) -> Option<Vec<String>> {
    match body.get("errors") {
        None | Some(Value::Null) => None,
        Some(Value::Array(errors)) if errors.is_empty() => None,
        Some(Value::Array(errors)) => Some(
            errors
                .iter()
                .map(|error| match error.get("message").and_then(Value::as_str) {
                    Some(message) => message.to_string(),
                    None => error.to_string(),
                })
                .collect(),
        ),
        Some(other) => Some(vec![other.to_string()]),
    }
}
