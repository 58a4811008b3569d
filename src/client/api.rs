//! API trait implemented by the HTTP client and by test fakes.

use super::error::ClientError;
use super::types::{
    CatalogEntry, CatalogKind, CountedResource, LogEntry, RemoteVersion, Statistics, SystemStatus,
    Task,
};

/// Read-only view of the Paperless-ngx API used by the metric sources.
#[async_trait::async_trait]
pub trait PaperlessApi: Send + Sync + 'static {
    /// List every object of a catalog collection, ordered by name.
    async fn list_catalog(&self, kind: CatalogKind) -> Result<Vec<CatalogEntry>, ClientError>;

    /// Total number of items in a collection, if the server reports it.
    async fn count(&self, resource: CountedResource) -> Result<Option<u64>, ClientError>;

    async fn list_tasks(&self) -> Result<Vec<Task>, ClientError>;

    /// Names of the available log streams.
    async fn list_logs(&self) -> Result<Vec<String>, ClientError>;

    /// Full current buffer of a log stream, oldest entry first.
    async fn get_log(&self, name: &str) -> Result<Vec<LogEntry>, ClientError>;

    async fn get_status(&self) -> Result<SystemStatus, ClientError>;

    async fn get_statistics(&self) -> Result<Statistics, ClientError>;

    /// Latest released version. Requires the server to reach the internet.
    async fn get_remote_version(&self) -> Result<RemoteVersion, ClientError>;
}
