//! Configuration module for the Paperless exporter.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Server settings (bind address, port, telemetry path)
//! - Paperless connection settings (URL, credentials, request timeout)
//! - Exporter settings (scrape timeout, enabled collectors)

mod app;
mod validation;

pub use app::{AppConfig, ExporterConfig, PaperlessConfig, ServerConfig};
pub use validation::{ConfigError, expand_env_vars, parse_duration};

// Re-export constants
pub use app::{DEFAULT_PORT, DEFAULT_SCRAPE_TIMEOUT, DEFAULT_TELEMETRY_PATH};
