//! Paperless-ngx Prometheus exporter
//!
//! This crate gathers metrics from a Paperless-ngx instance over its REST API
//! and exposes them in the Prometheus text format. It can be used as a library
//! or run as a standalone binary with the `paperless-exporter` executable.
//!
//! # Architecture
//!
//! - **Client**: Typed access to the Paperless REST API
//! - **Collector**: Metric sources and the orchestrator that runs them under a
//!   deadline, turning partial failures into categorized warnings
//! - **Exposition**: Rendering one collection cycle as Prometheus text
//! - **Server**: Axum HTTP endpoint for the external scraper
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use paperless_exporter::{
//!     ClientOptions, Exporter, Orchestrator, PaperlessClient, SourceOptions, build_sources,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(PaperlessClient::new(
//!         ClientOptions::new("http://paperless:8000").with_token("secret"),
//!     )?);
//!     let empty: &[&str] = &[];
//!     let sources = build_sources(client, empty, &SourceOptions::default())?;
//!     let exporter = Exporter::new(Orchestrator::new(sources))?;
//!
//!     println!("{}", exporter.scrape().await?);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod collector;
pub mod config;
pub mod exposition;
pub mod metric;
pub mod server;

#[cfg(test)]
mod testutil;

pub use client::{ClientError, ClientOptions, PaperlessApi, PaperlessClient};
pub use collector::{
    CollectContext, CollectError, Orchestrator, Sink, Source, SourceError, SourceOptions,
    Warning, WarningCategory, build_sources,
};
pub use config::{AppConfig, ConfigError};
pub use exposition::{Exporter, ExpositionError, exporter_registry};
pub use metric::{Descriptor, Measurement, MetricKind, Sample};
