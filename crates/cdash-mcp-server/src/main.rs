use std::net::IpAddr;
use std::path::PathBuf;

use cdash_mcp_server::server::{Server, Transport};
use clap::Parser;
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use runtime::Config;
use tracing::{info, warn};

mod runtime;

/// Clap styling
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Arguments to the MCP server
#[derive(Debug, clap::Parser)]
#[command(
    version,
    styles = STYLES,
    about = "CDash MCP Server - query CDash dashboards over GraphQL from an AI agent",
)]
struct Args {
    /// Path to the config file
    config: Option<PathBuf>,

    /// Transport protocol, overriding the config file
    #[arg(long, value_enum)]
    transport: Option<TransportKind>,

    /// Address to bind to (HTTP only)
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to listen on (HTTP only)
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum TransportKind {
    Stdio,
    Http,
}

impl Args {
    /// Apply the command line transport options on top of the configured transport
    fn transport(&self, configured: Transport) -> Transport {
        match (self.transport, configured) {
            (Some(TransportKind::Stdio), _) => Transport::Stdio,
            (None, Transport::Stdio) => Transport::Stdio,
            (Some(TransportKind::Http), Transport::Stdio) => Transport::StreamableHttp {
                address: self.host.unwrap_or_else(Transport::default_address),
                port: self.port.unwrap_or_else(Transport::default_port),
            },
            (_, Transport::StreamableHttp { address, port }) => Transport::StreamableHttp {
                address: self.host.unwrap_or(address),
                port: self.port.unwrap_or(port),
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config: Config = match &args.config {
        Some(path) => runtime::read_config(path)?,
        None => runtime::read_config_from_env()?,
    };
    let transport = args.transport(config.transport.clone());

    let _guard = config.logging.setup()?;

    info!(
        "CDash MCP Server v{} // Licensed under MIT",
        std::env!("CARGO_PKG_VERSION")
    );
    if matches!(transport, Transport::Stdio) && (args.host.is_some() || args.port.is_some()) {
        warn!("--host and --port only apply to the HTTP transport");
    }

    Ok(Server::builder()
        .transport(transport)
        .endpoint(config.endpoint)
        .cache(config.cache)
        .upstream_timeout(config.upstream.timeout)
        .build()
        .start()
        .await?)
}
