//! Response models for the Paperless-ngx REST API.
//!
//! Only the fields the exporter reports on are modelled; unknown fields are
//! ignored and most known ones default when absent so that older and newer
//! server versions both decode.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use strum_macros::{AsRefStr, Display, IntoStaticStr};

/// Named object collections that expose a per-object document count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum CatalogKind {
    Tag,
    Correspondent,
    DocumentType,
    StoragePath,
}

impl CatalogKind {
    /// API collection path relative to `/api/`.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Tag => "tags/",
            Self::Correspondent => "correspondents/",
            Self::DocumentType => "document_types/",
            Self::StoragePath => "storage_paths/",
        }
    }

    /// Human-readable singular noun used in help texts.
    pub fn noun(&self) -> &'static str {
        match self {
            Self::Tag => "tag",
            Self::Correspondent => "correspondent",
            Self::DocumentType => "document type",
            Self::StoragePath => "storage path",
        }
    }
}

/// Collections that are only reported by their total item count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum CountedResource {
    Documents,
    Users,
    Groups,
}

impl CountedResource {
    /// API collection path relative to `/api/`.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Documents => "documents/",
            Self::Users => "users/",
            Self::Groups => "groups/",
        }
    }
}

/// One page of a paginated list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Page<T> {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// Tag, correspondent, document type or storage path.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CatalogEntry {
    pub id: i64,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub document_count: u64,
    /// Only present on correspondents.
    #[serde(default)]
    pub last_correspondence: Option<DateTime<Utc>>,
}

/// Background task as reported by `/api/tasks/`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Task {
    pub id: i64,
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub task_file_name: Option<String>,
    #[serde(default, rename = "date_created")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, rename = "date_done")]
    pub done: Option<DateTime<Utc>>,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub status: String,
}

/// Parsed log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub time: DateTime<Utc>,
    pub level: String,
    pub module: String,
    pub message: String,
}

/// `/api/status/` response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SystemStatus {
    pub storage: StorageStatus,
    pub database: DatabaseStatus,
    pub tasks: TasksStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageStatus {
    pub total: u64,
    pub available: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseStatus {
    pub status: String,
    pub migration_status: MigrationStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MigrationStatus {
    pub unapplied_migrations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TasksStatus {
    pub redis_status: String,
    pub celery_status: String,
    pub index_status: String,
    pub index_last_modified: Option<DateTime<Utc>>,
    pub classifier_status: String,
    pub classifier_last_trained: Option<DateTime<Utc>>,
    pub sanity_check_status: String,
    pub sanity_check_last_run: Option<DateTime<Utc>>,
}

/// `/api/statistics/` response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Statistics {
    pub documents_total: u64,
    pub documents_inbox: Option<u64>,
    pub document_file_type_counts: Vec<FileTypeCount>,
    pub character_count: Option<u64>,
    pub tag_count: u64,
    pub correspondent_count: u64,
    pub document_type_count: u64,
    pub storage_path_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FileTypeCount {
    pub mime_type: String,
    pub mime_type_count: u64,
}

/// `/api/remote_version/` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RemoteVersion {
    pub version: String,
    pub update_available: bool,
}
