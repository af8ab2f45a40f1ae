//! Runtime utilites
//!
//! This module is only used by the binaries and provides helper code
//! related to runtime configuration.

mod config;
mod logging;

use std::path::Path;

pub use config::Config;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
pub use logging::Logging;

/// Prefix of the environment variables read into the config
const ENV_PREFIX: &str = "CDASH_MCP_";

/// Separator to use when drilling down into nested options in the env figment
const ENV_NESTED_SEPARATOR: &str = "__";

/// Read configuration from environment variables only (when no config file is provided)
#[allow(clippy::result_large_err)]
pub fn read_config_from_env() -> Result<Config, figment::Error> {
    Figment::new()
        .join(Env::prefixed(ENV_PREFIX).split(ENV_NESTED_SEPARATOR))
        .extract()
}

/// Read in a config from a YAML file, letting environment variables take precedence
#[allow(clippy::result_large_err)]
pub fn read_config(yaml_path: impl AsRef<Path>) -> Result<Config, figment::Error> {
    Figment::new()
        .join(Env::prefixed(ENV_PREFIX).split(ENV_NESTED_SEPARATOR))
        .join(Yaml::file(yaml_path))
        .extract()
}

#[cfg(test)]
mod test {
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    use cdash_mcp_server::server::Transport;

    use super::{read_config, read_config_from_env};

    #[test]
    fn it_defaults_everything() {
        figment::Jail::expect_with(|_jail| {
            let config = read_config_from_env()?;

            assert_eq!(config.endpoint.as_str(), "https://open.cdash.org");
            assert_eq!(config.transport, Transport::Stdio);
            assert_eq!(config.cache.capacity, 100);
            assert_eq!(config.cache.default_ttl, Duration::from_secs(300));
            assert_eq!(config.cache.sweep_interval, None);
            assert_eq!(config.upstream.timeout, Duration::from_secs(15));
            Ok(())
        });
    }

    #[test]
    fn it_reads_a_yaml_file() {
        let config = r#"
            endpoint: https://cdash.spack.io
            transport:
                type: streamable_http
                port: 9000
            cache:
                capacity: 2
                default_ttl: 1m
                sweep_interval: 30s
            upstream:
                timeout: 5s
            logging:
                level: debug
                rotation: daily
        "#;

        figment::Jail::expect_with(move |jail| {
            let path = "config.yaml";
            jail.create_file(path, config)?;

            let config = read_config(path)?;

            assert_eq!(config.endpoint.as_str(), "https://cdash.spack.io");
            assert_eq!(
                config.transport,
                Transport::StreamableHttp {
                    address: IpAddr::V4(Ipv4Addr::LOCALHOST),
                    port: 9000
                }
            );
            assert_eq!(config.cache.capacity, 2);
            assert_eq!(config.cache.default_ttl, Duration::from_secs(60));
            assert_eq!(config.cache.sweep_interval, Some(Duration::from_secs(30)));
            assert_eq!(config.upstream.timeout, Duration::from_secs(5));
            assert_eq!(config.logging.level, tracing::Level::DEBUG);
            Ok(())
        });
    }

    #[test]
    fn it_prioritizes_env_vars() {
        let config = r#"
            endpoint: https://open.cdash.org
        "#;

        figment::Jail::expect_with(move |jail| {
            let path = "config.yaml";
            let endpoint = "https://cdash.spack.io";

            jail.create_file(path, config)?;
            jail.set_env("CDASH_MCP_ENDPOINT", endpoint);

            let config = read_config(path)?;

            assert_eq!(config.endpoint.as_str(), endpoint);
            Ok(())
        });
    }

    #[test]
    fn it_extracts_nested_env() {
        let config = r#"
            cache:
                capacity: 10
        "#;

        figment::Jail::expect_with(move |jail| {
            let path = "config.yaml";

            jail.create_file(path, config)?;
            jail.set_env("CDASH_MCP_CACHE__DEFAULT_TTL", "90s");

            let config = read_config(path)?;

            assert_eq!(config.cache.capacity, 10);
            assert_eq!(config.cache.default_ttl, Duration::from_secs(90));
            Ok(())
        });
    }

    #[test]
    fn it_rejects_invalid_endpoints() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("CDASH_MCP_ENDPOINT", "ftp://open.cdash.org");

            assert!(read_config_from_env().is_err());
            Ok(())
        });
    }

    #[test]
    fn it_rejects_unknown_cache_options() {
        let config = r#"
            cache:
                size: 10
        "#;

        figment::Jail::expect_with(move |jail| {
            let path = "config.yaml";
            jail.create_file(path, config)?;

            assert!(read_config(path).is_err());
            Ok(())
        });
    }
}
