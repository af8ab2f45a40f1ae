use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use bon::bon;
use rmcp::ServiceExt as _;
use rmcp::transport::StreamableHttpService;
use rmcp::transport::stdio;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cache::{CacheConfig, QueryCache};
use crate::endpoint::Endpoint;
use crate::errors::ServerError;
use crate::executor::GraphQLExecutor;
use crate::graphql::HttpUpstream;

mod running;

use running::Running;

/// A CDash MCP Server
pub struct Server {
    transport: Transport,
    endpoint: Endpoint,
    cache: CacheConfig,
    upstream_timeout: Duration,
}

/// How the server talks to MCP clients
#[derive(Debug, Clone, Default, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transport {
    /// Use standard IO for server <> client communication
    #[default]
    Stdio,

    /// Host the MCP server on the supplied configuration, using streamable HTTP messages.
    StreamableHttp {
        /// The IP address to bind to
        #[serde(default = "Transport::default_address")]
        address: IpAddr,

        /// The port to bind to
        #[serde(default = "Transport::default_port")]
        port: u16,
    },
}

impl Transport {
    pub fn default_address() -> IpAddr {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    }

    pub fn default_port() -> u16 {
        8000
    }
}

#[bon]
impl Server {
    #[builder]
    pub fn new(
        transport: Transport,
        endpoint: Endpoint,
        cache: CacheConfig,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            endpoint,
            cache,
            upstream_timeout,
        }
    }

    /// Serve MCP clients until the transport closes or a shutdown signal arrives
    pub async fn start(self) -> Result<(), ServerError> {
        let cache = Arc::new(QueryCache::from_config(&self.cache)?);
        let executor = GraphQLExecutor::new(
            cache.clone(),
            HttpUpstream::new(self.upstream_timeout)?,
        );

        let cancellation_token = CancellationToken::new();
        let sweeper = self.cache.sweep_interval.map(|interval| {
            info!(?interval, "Sweeping expired cache entries periodically");
            cache
                .clone()
                .spawn_sweeper(interval, cancellation_token.child_token())
        });

        info!(
            endpoint = %self.endpoint,
            capacity = cache.capacity(),
            default_ttl = ?cache.default_ttl(),
            "Query cache ready"
        );
        let running = Running::new(executor, self.endpoint);
        let served = serve(self.transport, running).await;

        cancellation_token.cancel();
        if let Some(sweeper) = sweeper {
            sweeper.await?;
        }
        info!("MCP server stopped");
        served
    }
}

async fn serve(transport: Transport, running: Running) -> Result<(), ServerError> {
    match transport {
        Transport::StreamableHttp { address, port } => {
            info!(port = ?port, address = ?address, "Starting MCP server in Streamable HTTP mode");
            let listen_address = SocketAddr::new(address, port);
            let service = StreamableHttpService::new(
                move || Ok(running.clone()),
                LocalSessionManager::default().into(),
                Default::default(),
            );
            let router = axum::Router::new().nest_service("/mcp", service);
            let tcp_listener = TcpListener::bind(listen_address).await?;
            axum::serve(tcp_listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        Transport::Stdio => {
            info!("Starting MCP server in stdio mode");
            let service = running
                .serve(stdio())
                .await
                .inspect_err(|e| {
                    error!("serving error: {:?}", e);
                })
                .map_err(|e| ServerError::McpInitialize(e.to_string()))?;
            tokio::select! {
                quit_reason = service.waiting() => {
                    info!(?quit_reason, "MCP client disconnected");
                }
                _ = shutdown_signal() => {
                    info!("Shutdown signal received");
                }
            }
        }
    }
    Ok(())
}

/// Resolves on Ctrl-C or, on unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install CTRL+C signal handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
