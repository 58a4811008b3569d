//! Closed table of known sources and enablement rules.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::catalog::CatalogSource;
use super::count::CountSource;
use super::log::LogSource;
use super::remote_version::{REMOTE_VERSION_ID, RemoteVersionSource};
use super::statistics::StatisticsSource;
use super::status::StatusSource;
use super::task::TaskSource;
use super::traits::Source;
use crate::client::{CatalogKind, CountedResource, PaperlessApi};

/// Errors raised while selecting sources.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The id does not name a known source.
    #[error("unknown collector {0:?}")]
    Unknown(String),

    /// The id was listed more than once.
    #[error("collector {0:?} listed more than once")]
    Duplicate(String),
}

/// Settings shared by all source factories.
#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    /// Allow sources that make Paperless contact the public internet.
    pub enable_remote_network: bool,
    /// Background refresh interval of the remote version. Zero fetches it
    /// during every collection cycle instead.
    pub remote_version_interval: Duration,
    /// Cancelled on process shutdown; stops background tasks.
    pub shutdown: CancellationToken,
}

type Factory = fn(Arc<dyn PaperlessApi>, &SourceOptions) -> Arc<dyn Source>;

/// Every known source in default order.
pub const KNOWN_SOURCES: &[(&str, Factory)] = &[
    ("tag", |api, _| Arc::new(CatalogSource::new(api, CatalogKind::Tag))),
    ("correspondent", |api, _| {
        Arc::new(CatalogSource::new(api, CatalogKind::Correspondent))
    }),
    ("document_type", |api, _| {
        Arc::new(CatalogSource::new(api, CatalogKind::DocumentType))
    }),
    ("storage_path", |api, _| {
        Arc::new(CatalogSource::new(api, CatalogKind::StoragePath))
    }),
    ("task", |api, _| Arc::new(TaskSource::new(api))),
    ("log", |api, _| Arc::new(LogSource::new(api))),
    ("group", |api, _| Arc::new(CountSource::new(api, CountedResource::Groups))),
    ("user", |api, _| Arc::new(CountSource::new(api, CountedResource::Users))),
    ("document", |api, _| {
        Arc::new(CountSource::new(api, CountedResource::Documents))
    }),
    ("status", |api, _| Arc::new(StatusSource::new(api))),
    ("statistics", |api, _| Arc::new(StatisticsSource::new(api))),
    (REMOTE_VERSION_ID, |api, options| {
        if options.remote_version_interval.is_zero() {
            Arc::new(RemoteVersionSource::new(api))
        } else {
            Arc::new(RemoteVersionSource::with_background_refresh(
                api,
                options.remote_version_interval,
                options.shutdown.clone(),
            ))
        }
    }),
];

/// Ids of all known sources in default order.
pub fn known_ids() -> impl Iterator<Item = &'static str> {
    KNOWN_SOURCES.iter().map(|(id, _)| *id)
}

/// Check that every id is known and listed once.
///
/// # Errors
/// Returns the first unknown or duplicate id.
pub fn validate_ids<S: AsRef<str>>(ids: &[S]) -> Result<(), RegistryError> {
    let mut seen = HashSet::new();

    for id in ids {
        let id = id.as_ref();
        if !known_ids().any(|known| known == id) {
            return Err(RegistryError::Unknown(id.to_string()));
        }
        if !seen.insert(id) {
            return Err(RegistryError::Duplicate(id.to_string()));
        }
    }

    Ok(())
}

/// Instantiate the selected sources.
///
/// An empty `enabled` list selects every known source. `remote_version` is
/// skipped unless `options.enable_remote_network` is set, whether it was
/// listed explicitly or not. Sources are returned in table order.
///
/// # Errors
/// Fails before creating anything if an id is unknown or duplicated.
pub fn build_sources<S: AsRef<str>>(
    api: Arc<dyn PaperlessApi>,
    enabled: &[S],
    options: &SourceOptions,
) -> Result<Vec<Arc<dyn Source>>, RegistryError> {
    validate_ids(enabled)?;

    let selected: HashSet<&str> = enabled.iter().map(|s| s.as_ref()).collect();

    let sources = KNOWN_SOURCES
        .iter()
        .filter(|(id, _)| selected.is_empty() || selected.contains(id))
        .filter(|(id, _)| {
            let allowed = *id != REMOTE_VERSION_ID || options.enable_remote_network;
            if !allowed && selected.contains(id) {
                tracing::info!(
                    collector = id,
                    "Skipping collector, remote network access is not enabled"
                );
            }
            allowed
        })
        .map(|(_, factory)| factory(Arc::clone(&api), options))
        .collect::<Vec<_>>();

    tracing::debug!(
        collectors = ?sources.iter().map(|s| s.id()).collect::<Vec<_>>(),
        "Collectors enabled"
    );

    Ok(sources)
}
