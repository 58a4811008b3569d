//! System status: storage, database and background services.

use std::sync::Arc;

use crate::client::PaperlessApi;
use crate::collector::{CollectContext, Sink, Source, SourceError};
use crate::metric::{Descriptor, optional_timestamp};

fn is_ok(status: &str) -> f64 {
    if status.eq_ignore_ascii_case("OK") { 1.0 } else { 0.0 }
}

fn status_gauge(subject: &str, what: &str) -> Arc<Descriptor> {
    Descriptor::gauge(
        format!("paperless_status_{subject}_status"),
        format!("Status of {what}. 1 is OK, 0 is not OK."),
        &[],
    )
}

fn timestamp_gauge(name: &str, since: &str) -> Arc<Descriptor> {
    Descriptor::gauge(
        format!("paperless_status_{name}_timestamp_seconds"),
        format!("Number of seconds since 1970-01-01 since the last time {since}."),
        &[],
    )
}

/// Reports `/api/status/`.
pub struct StatusSource {
    api: Arc<dyn PaperlessApi>,
    storage_total: Arc<Descriptor>,
    storage_available: Arc<Descriptor>,
    database_status: Arc<Descriptor>,
    unapplied_migrations: Arc<Descriptor>,
    redis_status: Arc<Descriptor>,
    celery_status: Arc<Descriptor>,
    index_status: Arc<Descriptor>,
    index_last_modified: Arc<Descriptor>,
    classifier_status: Arc<Descriptor>,
    classifier_last_trained: Arc<Descriptor>,
    sanity_check_status: Arc<Descriptor>,
    sanity_check_last_run: Arc<Descriptor>,
}

impl StatusSource {
    pub fn new(api: Arc<dyn PaperlessApi>) -> Self {
        Self {
            api,
            storage_total: Descriptor::gauge(
                "paperless_status_storage_total_bytes",
                "Total storage of Paperless in bytes.",
                &[],
            ),
            storage_available: Descriptor::gauge(
                "paperless_status_storage_available_bytes",
                "Available storage of Paperless in bytes.",
                &[],
            ),
            database_status: status_gauge("database", "the database"),
            unapplied_migrations: Descriptor::gauge(
                "paperless_status_database_unapplied_migrations",
                "Number of unapplied database migrations.",
                &[],
            ),
            redis_status: status_gauge("redis", "redis"),
            celery_status: status_gauge("celery", "celery"),
            index_status: status_gauge("index", "the index"),
            index_last_modified: timestamp_gauge(
                "index_last_modified",
                "the index has been modified",
            ),
            classifier_status: status_gauge("classifier", "the classifier"),
            classifier_last_trained: timestamp_gauge(
                "classifier_last_trained",
                "the classifier has been trained",
            ),
            sanity_check_status: status_gauge("sanity_check", "the sanity check"),
            sanity_check_last_run: timestamp_gauge(
                "sanity_check_last_run",
                "the sanity check has been run",
            ),
        }
    }
}

impl std::fmt::Debug for StatusSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusSource").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Source for StatusSource {
    fn id(&self) -> &'static str {
        "status"
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        [
            &self.storage_total,
            &self.storage_available,
            &self.database_status,
            &self.unapplied_migrations,
            &self.redis_status,
            &self.celery_status,
            &self.index_status,
            &self.index_last_modified,
            &self.classifier_status,
            &self.classifier_last_trained,
            &self.sanity_check_status,
            &self.sanity_check_last_run,
        ]
        .into_iter()
        .map(Arc::clone)
        .collect()
    }

    async fn collect(&self, ctx: &CollectContext, sink: &Sink) -> Result<(), SourceError> {
        let status = ctx.run(self.api.get_status()).await?;
        let tasks = &status.tasks;

        let values = [
            (&self.storage_total, status.storage.total as f64),
            (&self.storage_available, status.storage.available as f64),
            (&self.database_status, is_ok(&status.database.status)),
            (
                &self.unapplied_migrations,
                status.database.migration_status.unapplied_migrations.len() as f64,
            ),
            (&self.redis_status, is_ok(&tasks.redis_status)),
            (&self.celery_status, is_ok(&tasks.celery_status)),
            (&self.index_status, is_ok(&tasks.index_status)),
            (
                &self.index_last_modified,
                optional_timestamp(tasks.index_last_modified.as_ref()),
            ),
            (&self.classifier_status, is_ok(&tasks.classifier_status)),
            (
                &self.classifier_last_trained,
                optional_timestamp(tasks.classifier_last_trained.as_ref()),
            ),
            (&self.sanity_check_status, is_ok(&tasks.sanity_check_status)),
            (
                &self.sanity_check_last_run,
                optional_timestamp(tasks.sanity_check_last_run.as_ref()),
            ),
        ];

        for (desc, value) in values {
            sink.emit(desc, value, &[]).await?;
        }

        Ok(())
    }
}
