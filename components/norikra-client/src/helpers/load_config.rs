// Local crates
use crate::helpers::time_format::{DEFAULT_TIME_FORMAT, TimeFormatter, TimeZoneMode};
use crate::parser::parser::Format;

// External crates
use serde::Deserialize;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::instrument;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 26571;
pub const DEFAULT_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_TIME_KEY: &str = "time";
pub const DEFAULT_QUERY_NAME_KEY: &str = "query";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Configuration and option resolution failures, reported before any
/// remote call.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse TOML from {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("batch size must be a positive integer")]
    ZeroBatchSize,
    #[error("invalid time format '{0}'")]
    InvalidTimeFormat(String),
}

/// Optional client configuration file.
///
/// Every key has a built-in default, so an absent file and an empty file
/// behave the same. Command line flags take precedence over the file.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub event: EventConfig,
}

/// `[server]` table.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// `[event]` table.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EventConfig {
    pub format: Format,
    pub batch_size: usize,
    pub time_key: String,
    pub time_format: String,
    pub time_zone: TimeZoneMode,
    pub query_name_key: String,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            format: Format::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            time_key: DEFAULT_TIME_KEY.to_string(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            time_zone: TimeZoneMode::default(),
            query_name_key: DEFAULT_QUERY_NAME_KEY.to_string(),
        }
    }
}

impl Config {
    /// Load and parse the configuration file
    #[instrument(
        name = "config_loader",
        target = "helpers::load_config",
        level = "trace",
        skip_all
    )]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        tracing::trace!(
            configuration_file_path = %path_ref.display(),
            "Loading client configuration file"
        );

        let config_str = match fs::read_to_string(path_ref) {
            Ok(s) => s,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read configuration file");
                return Err(ConfigError::Read {
                    path: path_ref.to_path_buf(),
                    source: e,
                });
            }
        };
        let config: Config = match toml::from_str(&config_str) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to parse TOML configuration");
                return Err(ConfigError::Parse {
                    path: path_ref.to_path_buf(),
                    source: e,
                });
            }
        };

        tracing::trace!(configuration_file_path = %path_ref.display(), "Client configuration file loaded successfully");
        Ok(config)
    }

    /// Load the file when one was given, fall back to defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// Apply command line overrides for the server connection.
    pub fn server_endpoint(&self, host: Option<String>, port: Option<u16>) -> Endpoint {
        Endpoint {
            host: host.unwrap_or_else(|| self.server.host.clone()),
            port: port.unwrap_or(self.server.port),
            timeout: Duration::from_millis(self.server.timeout_ms),
        }
    }

    /// Resolve the event formatting options for one invocation.
    ///
    /// Values from `overrides` win over the file, the file wins over the
    /// built-in defaults. The result is immutable for the rest of the command.
    pub fn format_options(&self, overrides: EventOverrides) -> Result<FormatOptions, ConfigError> {
        let event = &self.event;

        let batch_size = overrides.batch_size.unwrap_or(event.batch_size);
        let batch_size = NonZeroUsize::new(batch_size).ok_or(ConfigError::ZeroBatchSize)?;

        let zone = if overrides.utc {
            TimeZoneMode::Utc
        } else {
            event.time_zone
        };
        let time_format = overrides
            .time_format
            .unwrap_or_else(|| event.time_format.clone());

        Ok(FormatOptions {
            format: overrides.format.unwrap_or(event.format),
            batch_size,
            time_key: overrides
                .time_key
                .unwrap_or_else(|| event.time_key.clone()),
            time_formatter: TimeFormatter::new(time_format, zone)?,
            query_name_key: overrides
                .query_name_key
                .unwrap_or_else(|| event.query_name_key.clone()),
        })
    }
}

/// Where the server lives and how long a single call may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

impl Endpoint {
    /// Base URL every RPC call is posted to.
    pub fn url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }
}

/// Event options given on the command line, `None` when not given.
#[derive(Debug, Clone, Default)]
pub struct EventOverrides {
    pub format: Option<Format>,
    pub batch_size: Option<usize>,
    pub time_key: Option<String>,
    pub time_format: Option<String>,
    pub query_name_key: Option<String>,
    pub utc: bool,
}

/// Fully resolved formatting options of a single `event` command.
#[derive(Debug, Clone)]
pub struct FormatOptions {
    pub format: Format,
    pub batch_size: NonZeroUsize,
    pub time_key: String,
    pub time_formatter: TimeFormatter,
    pub query_name_key: String,
}
