//! In-memory [`PaperlessApi`] and helpers shared by unit tests.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use crate::client::{
    CatalogEntry, CatalogKind, ClientError, CountedResource, LogEntry, PaperlessApi,
    RemoteVersion, Statistics, SystemStatus, Task,
};
use crate::collector::{CollectContext, Item, Sink, Source, SourceError};
use crate::metric::Measurement;

/// Error returned by the fake for a given HTTP status.
pub fn status_error(status: u16, path: &str) -> ClientError {
    ClientError::Status {
        status,
        url: format!("http://paperless.test/api/{path}"),
    }
}

/// Programmable fake. Every response is cloned per call; `None` errors
/// become a 500 status error.
#[derive(Default)]
pub struct FakeApi {
    pub catalog: Mutex<HashMap<CatalogKind, Vec<CatalogEntry>>>,
    pub counts: Mutex<HashMap<CountedResource, Option<u64>>>,
    pub tasks: Mutex<Option<Vec<Task>>>,
    pub log_names: Mutex<Option<Vec<String>>>,
    /// Stream name to entries, or to an HTTP status to fail with.
    pub logs: Mutex<HashMap<String, Result<Vec<LogEntry>, u16>>>,
    pub status: Mutex<Option<SystemStatus>>,
    pub statistics: Mutex<Option<Statistics>>,
    pub remote_version: Mutex<Option<RemoteVersion>>,
    pub fail_catalog: Mutex<bool>,
    /// Streams whose fetch sleeps this long before answering.
    pub log_delays: Mutex<HashMap<String, Duration>>,
    /// Streams whose delayed fetch was dropped before it finished.
    pub abandoned_logs: Mutex<Vec<String>>,
}

/// Records a stream in `abandoned_logs` unless disarmed.
struct AbandonGuard<'a> {
    name: &'a str,
    abandoned: &'a Mutex<Vec<String>>,
    armed: bool,
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.abandoned.lock().push(self.name.to_string());
        }
    }
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_log(&self, name: &str, entries: Vec<LogEntry>) {
        self.logs.lock().insert(name.to_string(), Ok(entries));
    }

    pub fn fail_log(&self, name: &str, status: u16) {
        self.logs.lock().insert(name.to_string(), Err(status));
    }

    pub fn delay_log(&self, name: &str, delay: Duration) {
        self.log_delays.lock().insert(name.to_string(), delay);
    }
}

#[async_trait::async_trait]
impl PaperlessApi for FakeApi {
    async fn list_catalog(&self, kind: CatalogKind) -> Result<Vec<CatalogEntry>, ClientError> {
        if *self.fail_catalog.lock() {
            return Err(status_error(500, kind.path()));
        }
        Ok(self.catalog.lock().get(&kind).cloned().unwrap_or_default())
    }

    async fn count(&self, resource: CountedResource) -> Result<Option<u64>, ClientError> {
        self.counts
            .lock()
            .get(&resource)
            .copied()
            .ok_or_else(|| status_error(500, resource.path()))
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, ClientError> {
        self.tasks.lock().clone().ok_or_else(|| status_error(500, "tasks/"))
    }

    async fn list_logs(&self) -> Result<Vec<String>, ClientError> {
        self.log_names
            .lock()
            .clone()
            .ok_or_else(|| status_error(500, "logs/"))
    }

    async fn get_log(&self, name: &str) -> Result<Vec<LogEntry>, ClientError> {
        let delay = self.log_delays.lock().get(name).copied();
        if let Some(delay) = delay {
            let mut guard = AbandonGuard {
                name,
                abandoned: &self.abandoned_logs,
                armed: true,
            };
            tokio::time::sleep(delay).await;
            guard.armed = false;
        }

        match self.logs.lock().get(name) {
            Some(Ok(entries)) => Ok(entries.clone()),
            Some(Err(status)) => Err(status_error(*status, &format!("logs/{name}/"))),
            None => Err(status_error(404, &format!("logs/{name}/"))),
        }
    }

    async fn get_status(&self) -> Result<SystemStatus, ClientError> {
        self.status.lock().clone().ok_or_else(|| status_error(500, "status/"))
    }

    async fn get_statistics(&self) -> Result<Statistics, ClientError> {
        self.statistics
            .lock()
            .clone()
            .ok_or_else(|| status_error(500, "statistics/"))
    }

    async fn get_remote_version(&self) -> Result<RemoteVersion, ClientError> {
        self.remote_version
            .lock()
            .clone()
            .ok_or_else(|| status_error(500, "remote_version/"))
    }
}

/// Everything a single `collect` call wrote, in write order.
#[derive(Debug, Default)]
pub struct Collected {
    pub measurements: Vec<Measurement>,
    pub warnings: Vec<crate::collector::Warning>,
}

impl Collected {
    /// Values of `name`, each rendered as `label=value,...` plus the value.
    pub fn series(&self, name: &str) -> Vec<(String, f64)> {
        let mut series: Vec<_> = self
            .measurements
            .iter()
            .filter(|m| m.desc().name() == name)
            .map(|m| {
                let labels: Vec<_> = m.labels().map(|(k, v)| format!("{k}={v}")).collect();
                (labels.join(","), m.value())
            })
            .collect();
        series.sort_by(|a, b| a.0.cmp(&b.0));
        series
    }

    /// Single unlabelled value of `name`.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.measurements
            .iter()
            .find(|m| m.desc().name() == name)
            .map(|m| m.value())
    }
}

/// Run `source.collect` once and gather its output.
pub async fn collect_source<S: Source + ?Sized>(source: &S) -> Result<Collected, SourceError> {
    let (sink, mut rx) = Sink::channel(1);
    let ctx = CollectContext::default();

    let drain = tokio::spawn(async move {
        let mut collected = Collected::default();
        while let Some(item) = rx.recv().await {
            match item {
                Item::Measurement(m) => collected.measurements.push(m),
                Item::Warning(w) => collected.warnings.push(w),
            }
        }
        collected
    });

    let result = source.collect(&ctx, &sink).await;
    drop(sink);

    let collected = drain.await.expect("drain task panicked");
    result.map(|()| collected)
}

/// Assert that every emitted measurement uses a described descriptor.
pub fn assert_described<S: Source + ?Sized>(source: &S, collected: &Collected) {
    let described: Vec<_> = source.describe();
    for m in &collected.measurements {
        assert!(
            described.iter().any(|d| d == m.desc()),
            "{} was emitted but not described",
            m.desc()
        );
    }
}
