//! Application configuration structures.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::client::{ClientOptions, DEFAULT_REQUEST_TIMEOUT};
use crate::collector::{SourceOptions, validate_ids};

use super::validation::{
    ConfigError, expand_env_vars, validate_bind, validate_paperless_url, validate_telemetry_path,
};

// =============================================================================
// Constants
// =============================================================================

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8081;

/// Default path under which metrics are served.
pub const DEFAULT_TELEMETRY_PATH: &str = "/metrics";

/// Default scrape timeout (1 minute).
pub const DEFAULT_SCRAPE_TIMEOUT: Duration = Duration::from_secs(60);

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_scrape_timeout() -> Duration {
    DEFAULT_SCRAPE_TIMEOUT
}

// =============================================================================
// Server Configuration
// =============================================================================

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address (default: "0.0.0.0").
    pub bind: String,

    /// Server port (default: 8081).
    pub port: u16,

    /// Path under which metrics are exposed (default: "/metrics").
    pub telemetry_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            telemetry_path: DEFAULT_TELEMETRY_PATH.to_string(),
        }
    }
}

// =============================================================================
// Paperless Configuration
// =============================================================================

/// Connection settings for the Paperless instance.
#[derive(Clone, Serialize, Deserialize)]
pub struct PaperlessConfig {
    /// Base URL, e.g. `http://paperless:8000`.
    #[serde(default)]
    pub url: String,

    /// API token.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Username for HTTP basic auth.
    #[serde(default)]
    pub username: Option<String>,

    /// Password for HTTP basic auth.
    #[serde(default)]
    pub password: Option<String>,

    /// Per-request timeout (default: 30s).
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for PaperlessConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            auth_token: None,
            username: None,
            password: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for PaperlessConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaperlessConfig")
            .field("url", &self.url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("username", &self.username)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl PaperlessConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        validate_paperless_url(&self.url)?;

        match (&self.username, &self.password) {
            (Some(_), None) | (None, Some(_)) => {
                return Err(ConfigError::invalid(
                    "paperless username and password must be set together",
                ));
            }
            (Some(_), Some(_)) if self.auth_token.is_some() => {
                return Err(ConfigError::invalid(
                    "paperless auth_token and username/password are mutually exclusive",
                ));
            }
            _ => {}
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::invalid(
                "paperless request_timeout must be positive",
            ));
        }

        Ok(())
    }

    /// Client settings derived from this section.
    pub fn client_options(&self) -> ClientOptions {
        let mut options = ClientOptions::new(&self.url).with_timeout(self.request_timeout);

        if let Some(token) = &self.auth_token {
            options = options.with_token(token);
        }
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            options = options.with_basic_auth(username, password);
        }

        options
    }
}

// =============================================================================
// Exporter Configuration
// =============================================================================

/// Collection behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Budget for one collection cycle (default: 1m, "0s" disables it).
    #[serde(default = "default_scrape_timeout", with = "humantime_serde")]
    pub scrape_timeout: Duration,

    /// Enable sources that make Paperless contact the public internet.
    #[serde(default)]
    pub enable_remote_network: bool,

    /// Collector ids to enable. Empty enables every collector.
    #[serde(default)]
    pub collectors: Vec<String>,

    /// Omit build info and process metrics from the output.
    #[serde(default)]
    pub disable_exporter_metrics: bool,

    /// Background refresh interval of the remote version ("0s" fetches it
    /// during every scrape).
    #[serde(default, with = "humantime_serde")]
    pub remote_version_interval: Duration,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            scrape_timeout: DEFAULT_SCRAPE_TIMEOUT,
            enable_remote_network: false,
            collectors: Vec::new(),
            disable_exporter_metrics: false,
            remote_version_interval: Duration::ZERO,
        }
    }
}

impl ExporterConfig {
    /// Source settings derived from this section.
    pub fn source_options(&self, shutdown: CancellationToken) -> SourceOptions {
        SourceOptions {
            enable_remote_network: self.enable_remote_network,
            remote_version_interval: self.remote_version_interval,
            shutdown,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Web server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Paperless connection settings.
    #[serde(default)]
    pub paperless: PaperlessConfig,

    /// Collection behaviour.
    #[serde(default)]
    pub exporter: ExporterConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// `${VAR}` and `${VAR:-default}` references are expanded before parsing.
    /// The result is not validated so that command line overrides can be
    /// applied first.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text.
    ///
    /// # Errors
    /// Returns `ConfigError::ParseError` on malformed YAML.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(content);
        Ok(serde_yaml::from_str(&expanded)?)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_bind(&self.server.bind)?;

        if self.server.port == 0 {
            return Err(ConfigError::invalid("server port must be non-zero"));
        }

        validate_telemetry_path(&self.server.telemetry_path)?;

        self.paperless.validate()?;

        validate_ids(&self.exporter.collectors)
            .map_err(|e| ConfigError::invalid(format!("exporter collectors: {e}")))?;

        Ok(())
    }

    /// Socket address string the server listens on.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}
