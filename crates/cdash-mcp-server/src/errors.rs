use std::time::Duration;

use rmcp::model::{CallToolResult, Content, ErrorCode};
use tokio::task::JoinError;

/// An error in cache construction
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CacheConfigError {
    #[error("cache default_ttl must be greater than zero")]
    ZeroDefaultTtl,

    #[error("cache sweep_interval must be greater than zero")]
    ZeroSweepInterval,
}

/// An error in a cache operation
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache TTL override must be a positive number of seconds")]
    InvalidTtl,
}

/// A failure to reach the upstream GraphQL endpoint
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to send GraphQL request: {0}")]
    Request(String),
}

/// A failure reported by the upstream GraphQL endpoint
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("GraphQL errors: {}", .0.join("; "))]
    GraphQL(Vec<String>),

    #[error("failed to read GraphQL response body: {0}")]
    InvalidBody(String),
}

/// An error executing a GraphQL query
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExecuteError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),
}

impl From<CacheError> for ExecuteError {
    fn from(error: CacheError) -> Self {
        ExecuteError::InvalidInput(error.to_string())
    }
}

impl ExecuteError {
    /// Surface the error to an MCP client.
    ///
    /// Invalid input is a protocol-level parameter error. Transport and upstream
    /// failures are tool results flagged as errors carrying the upstream message.
    pub fn into_tool_result(self) -> Result<CallToolResult, McpError> {
        match self {
            ExecuteError::InvalidInput(reason) => {
                Err(McpError::new(ErrorCode::INVALID_PARAMS, reason, None))
            }
            other => Ok(CallToolResult {
                content: vec![Content::text(other.to_string())],
                is_error: Some(true),
            }),
        }
    }
}

/// An error in server initialization
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid cache configuration: {0}")]
    CacheConfig(#[from] CacheConfigError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Could not bind listener: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to initialize MCP service: {0}")]
    McpInitialize(String),

    #[error("Failed to start server")]
    StartupError(#[from] JoinError),
}

/// An MCP tool error
pub type McpError = rmcp::model::ErrorData;
