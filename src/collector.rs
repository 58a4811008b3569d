//! Collector Layer
//!
//! Metric sources and the orchestrator that runs them. Each collection
//! cycle fans out to all enabled sources in their own Tokio tasks; their
//! output is merged through a bounded MPSC sink.
//!
//! # Architecture
//!
//! - [`Source`]: Core trait for implementing metric sources
//! - [`Orchestrator`]: Runs one collection cycle under a deadline
//! - [`build_sources`]: Selects sources from the closed registry table
//! - [`LogSource`]: Incremental log entry counting via watermarks
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use paperless_exporter::{ClientOptions, Orchestrator, PaperlessClient, SourceOptions, build_sources};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(PaperlessClient::new(ClientOptions::new("http://paperless:8000"))?);
//! let sources = build_sources(client, &["document", "status"], &SourceOptions::default())?;
//! let orchestrator = Orchestrator::new(sources).with_timeout(Duration::from_secs(60));
//! let samples = orchestrator.collect().await;
//! # let _ = samples;
//! # Ok(())
//! # }
//! ```

mod catalog;
mod count;
pub mod log;
mod orchestrator;
mod registry;
mod remote_version;
mod statistics;
mod status;
mod task;
mod traits;

pub use catalog::CatalogSource;
pub use count::CountSource;
pub use log::{LogSource, WatermarkTracker};
pub use orchestrator::{CollectError, ERROR_METRIC, Orchestrator, WARNINGS_METRIC, format_warnings};
pub use registry::{
    KNOWN_SOURCES, RegistryError, SourceOptions, build_sources, known_ids, validate_ids,
};
pub use remote_version::{REMOTE_VERSION_ID, RemoteVersionSource};
pub use statistics::StatisticsSource;
pub use status::StatusSource;
pub use task::TaskSource;
pub use traits::{
    CollectContext, Item, Sink, Source, SourceError, Warning, WarningCategory,
};

/// Default concurrency limit: one running task per available CPU.
pub(crate) fn default_concurrency_limit() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}
