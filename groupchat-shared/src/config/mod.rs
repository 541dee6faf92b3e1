//! # Configuration
//!
//! Client configuration: server endpoints, reconnect policy, session storage,
//! and logging. Values resolve in order defaults → file → environment.

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use url::Url;

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/";
const DEFAULT_WS_BASE_URL: &str = "ws://127.0.0.1:8000/";
const DEFAULT_RECONNECT_DELAY_SECS: u64 = 6;
const DEFAULT_SESSION_TTL_HOURS: u32 = 24;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        /// File that was requested.
        path: PathBuf,
        /// Underlying read failure.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML or JSON for [`ClientConfig`].
    #[error("failed to parse configuration file {path}: {message}")]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// The extension is not one of the supported formats.
    #[error("unsupported configuration format for {0}; use .yaml, .yml or .json")]
    UnsupportedFormat(PathBuf),

    /// A value was present but unusable.
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        /// Dotted config key or environment variable.
        field: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Output format of log lines.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidValue {
                field: "logging.format".into(),
                message: format!("expected `text` or `json`, got `{other}`"),
            }),
        }
    }
}

/// Where the chat server lives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerEndpoints {
    /// Base URL of the HTTP API.
    pub api_base_url: String,
    /// Base URL of the live channel endpoints.
    pub ws_base_url: String,
}

impl Default for ServerEndpoints {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            ws_base_url: DEFAULT_WS_BASE_URL.to_string(),
        }
    }
}

impl ServerEndpoints {
    /// The HTTP API base, always ending in `/` so relative paths append.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] if the value is not a URL.
    pub fn api_url(&self) -> Result<Url, ConfigError> {
        base_url("server.api_base_url", &self.api_base_url)
    }

    /// The live channel base, always ending in `/` so relative paths append.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] if the value is not a URL.
    pub fn ws_url(&self) -> Result<Url, ConfigError> {
        base_url("server.ws_base_url", &self.ws_base_url)
    }
}

/// Live connection behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Fixed delay before reconnecting after the channel drops.
    pub reconnect_delay_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_secs: DEFAULT_RECONNECT_DELAY_SECS,
        }
    }
}

impl ConnectionConfig {
    /// [`Self::reconnect_delay_secs`] as a [`Duration`].
    #[must_use]
    pub const fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

/// Persisted session settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// Session file location; the platform config dir when unset.
    pub path: Option<PathBuf>,
    /// Lifetime of a stored session.
    pub ttl_hours: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: None,
            ttl_hours: DEFAULT_SESSION_TTL_HOURS,
        }
    }
}

impl SessionConfig {
    /// Resolved session file path.
    #[must_use]
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_session_path)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// The main configuration structure for the groupchat client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Server endpoints.
    pub server: ServerEndpoints,
    /// Live connection behaviour.
    pub connection: ConnectionConfig,
    /// Session storage.
    pub session: SessionConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Generates a default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Loads the configuration from a file, environment variables, or defaults.
    ///
    /// # Arguments
    /// * `config_path` - Optional path to a `.yaml`/`.yml` or `.json` file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, an environment
    /// override is malformed, or the resolved configuration is invalid.
    pub fn load_config(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => Self::with_defaults(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_error = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => {
                serde_yml::from_str(&content).map_err(|err| parse_error(err.to_string()))
            }
            Some("json") => {
                serde_json::from_str(&content).map_err(|err| parse_error(err.to_string()))
            }
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Applies `GROUPCHAT_*` environment overrides.
    ///
    /// # Errors
    /// Returns an error when an override cannot be parsed.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(value) = env::var("GROUPCHAT_API_URL") {
            self.server.api_base_url = value.trim().to_string();
        }
        if let Ok(value) = env::var("GROUPCHAT_WS_URL") {
            self.server.ws_base_url = value.trim().to_string();
        }
        if let Ok(value) = env::var("GROUPCHAT_RECONNECT_DELAY_SECS") {
            self.connection.reconnect_delay_secs =
                value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    field: "GROUPCHAT_RECONNECT_DELAY_SECS".into(),
                    message: format!("`{value}` is not a number of seconds"),
                })?;
        }
        if let Ok(value) = env::var("GROUPCHAT_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Ok(value) = env::var("GROUPCHAT_LOG_FORMAT") {
            self.logging.format = value.parse()?;
        }
        if let Ok(value) = env::var("GROUPCHAT_SESSION_PATH") {
            self.session.path = Some(PathBuf::from(value));
        }
        Ok(())
    }

    /// Validates the resolved configuration.
    ///
    /// # Errors
    /// Returns the first invalid field found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.server.api_url()?.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                field: "server.api_base_url".into(),
                message: "scheme must be http or https".into(),
            });
        }
        if !matches!(self.server.ws_url()?.scheme(), "ws" | "wss") {
            return Err(ConfigError::InvalidValue {
                field: "server.ws_base_url".into(),
                message: "scheme must be ws or wss".into(),
            });
        }
        if self.connection.reconnect_delay_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "connection.reconnect_delay_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.session.ttl_hours == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.ttl_hours".into(),
                message: "must be greater than 0".into(),
            });
        }
        Ok(())
    }
}

/// Default location of the persisted session.
#[must_use]
pub fn default_session_path() -> PathBuf {
    BaseDirs::new()
        .map(|dirs| dirs.config_dir().join("groupchat").join("session.json"))
        .unwrap_or_else(|| PathBuf::from("./session.json"))
}

fn base_url(field: &str, value: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(value.trim()).map_err(|err| ConfigError::InvalidValue {
        field: field.into(),
        message: err.to_string(),
    })?;
    // Relative joins drop the last segment unless the path ends in a slash.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
