//! Configuration validation utilities.

use std::net::IpAddr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    ValidationError(String),
}

impl ConfigError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }
}

/// Parse duration string using humantime.
///
/// Supports various formats: `30s`, `1m`, `5m30s`, `1h`, `100ms`, etc.
/// `0s` is accepted and means "disabled" wherever a duration is optional.
///
/// # Examples
///
/// ```
/// use paperless_exporter::config::parse_duration;
///
/// assert_eq!(parse_duration("1m").unwrap().as_secs(), 60);
/// assert_eq!(parse_duration("0s").unwrap().as_secs(), 0);
/// assert_eq!(parse_duration("1h30m").unwrap().as_secs(), 5400);
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("duration string is empty".to_string());
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Expand environment variables in a string.
/// Supports ${VAR} and ${VAR:-default} syntax.
pub fn expand_env_vars(input: &str) -> String {
    static ENV_VAR_REGEX: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();

    let regex = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("failed to compile env var regex")
    });

    regex
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var_name).unwrap_or_else(|_| default_value.to_string())
        })
        .into_owned()
}

pub(crate) fn validate_bind(bind: &str) -> Result<(), ConfigError> {
    bind.parse::<IpAddr>()
        .map(|_| ())
        .map_err(|_| ConfigError::invalid(format!("invalid server bind address: '{bind}'")))
}

pub(crate) fn validate_telemetry_path(path: &str) -> Result<(), ConfigError> {
    if !path.starts_with('/') {
        return Err(ConfigError::invalid(format!(
            "telemetry path must start with '/': '{path}'"
        )));
    }
    if path == "/" {
        return Err(ConfigError::invalid(
            "telemetry path must not be '/', it serves the landing page",
        ));
    }
    Ok(())
}

pub(crate) fn validate_paperless_url(raw: &str) -> Result<(), ConfigError> {
    if raw.trim().is_empty() {
        return Err(ConfigError::invalid("paperless url is required"));
    }

    let url = Url::parse(raw)
        .map_err(|e| ConfigError::invalid(format!("invalid paperless url '{raw}': {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::invalid(format!(
            "paperless url must use http or https, got '{other}'"
        ))),
    }
}
