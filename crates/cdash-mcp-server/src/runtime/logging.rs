//! Logging config and setup
//!
//! Logs never go to stdout, which carries MCP messages under the stdio transport.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Logging related options
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct Logging {
    /// The log level to use for tracing (default: info)
    #[serde(deserialize_with = "level_from_str")]
    #[schemars(schema_with = "level_schema")]
    pub level: Level,

    /// Directory to write log files to. Logs go to stderr when unset.
    pub path: Option<PathBuf>,

    /// Log file rotation period when a path is set (default: daily)
    pub rotation: LogRotation,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            path: None,
            rotation: LogRotation::default(),
        }
    }
}

/// How often a new log file is started
#[derive(Debug, Clone, Copy, Default, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(value: LogRotation) -> Self {
        match value {
            LogRotation::Minutely => Rotation::MINUTELY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

impl Logging {
    pub fn env_filter(&self) -> Result<EnvFilter, anyhow::Error> {
        let mut env_filter = EnvFilter::from_default_env().add_directive(self.level.into());

        if self.level == Level::INFO {
            env_filter = env_filter.add_directive("rmcp=warn".parse()?);
        }
        Ok(env_filter)
    }

    /// Install the global subscriber, returning the guard that flushes file logs on drop
    pub fn setup(&self) -> Result<Option<WorkerGuard>, anyhow::Error> {
        let (writer, guard, with_ansi) = match self.file_appender() {
            Some(appender) => {
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                (BoxMakeWriter::new(non_blocking), Some(guard), false)
            }
            None => (BoxMakeWriter::new(std::io::stderr), None, true),
        };

        tracing_subscriber::registry()
            .with(self.env_filter()?)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(with_ansi)
                    .with_target(false),
            )
            .try_init()?;

        Ok(guard)
    }

    /// A rolling file appender for the configured path, if one can be created
    fn file_appender(&self) -> Option<RollingFileAppender> {
        let path = self.path.as_ref()?;
        let appender = std::fs::create_dir_all(path)
            .map_err(anyhow::Error::from)
            .and_then(|_| {
                RollingFileAppender::builder()
                    .rotation(self.rotation.into())
                    .filename_prefix("cdash_mcp_server")
                    .filename_suffix("log")
                    .build(path)
                    .map_err(anyhow::Error::from)
            });

        match appender {
            Ok(appender) => Some(appender),
            Err(e) => {
                eprintln!(
                    "Failed to set up log file in {} - falling back to stderr: {e:?}",
                    path.display()
                );
                None
            }
        }
    }
}

fn level_from_str<'de, D>(deserializer: D) -> Result<Level, D::Error>
where
    D: Deserializer<'de>,
{
    let level = String::deserialize(deserializer)?;
    level.parse().map_err(serde::de::Error::custom)
}

fn level_schema(_generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
    schemars::json_schema!({
        "description": "Log level",
        "type": "string",
        "enum": ["trace", "debug", "info", "warn", "error"]
    })
}
