//! Paperless-ngx API Client
//!
//! Thin REST client for the endpoints the exporter reads. Sources depend on
//! the [`PaperlessApi`] trait rather than on the concrete reqwest-backed
//! [`PaperlessClient`], so they can be exercised against in-memory fakes.
//!
//! # Example
//!
//! ```rust,no_run
//! use paperless_exporter::client::{ClientOptions, PaperlessApi, PaperlessClient};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = PaperlessClient::new(
//!     ClientOptions::new("http://paperless.local:8000").with_token("secret"),
//! )?;
//! let names = client.list_logs().await?;
//! # Ok(())
//! # }
//! ```

mod api;
mod error;
mod http;
mod logs;
mod types;

pub use api::PaperlessApi;
pub use error::ClientError;
pub use http::{ClientOptions, DEFAULT_REQUEST_TIMEOUT, PaperlessClient};
pub use logs::parse_log_lines;
pub use types::{
    CatalogEntry, CatalogKind, CountedResource, DatabaseStatus, FileTypeCount, LogEntry,
    MigrationStatus, RemoteVersion, Statistics, StorageStatus, SystemStatus, Task, TasksStatus,
};
