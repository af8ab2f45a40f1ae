use std::time::Duration;

use cdash_mcp_server::{cache::CacheConfig, endpoint::Endpoint, server::Transport};
use schemars::JsonSchema;
use serde::Deserialize;
use url::Url;

use super::Logging;

/// Configuration for the MCP server
#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// The CDash instance queried by tools called without a `base_url`
    #[schemars(schema_with = "Url::json_schema")]
    pub endpoint: Endpoint,

    /// Query cache configuration
    pub cache: CacheConfig,

    /// Logging configuration
    pub logging: Logging,

    /// The type of server transport to use
    pub transport: Transport,

    /// Requests to CDash instances
    pub upstream: UpstreamConfig,
}

/// Options for requests sent to CDash
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct UpstreamConfig {
    /// How long to wait for a CDash instance to respond (default: 15s)
    #[serde(with = "humantime_serde")]
    #[schemars(with = "String")]
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
        }
    }
}
