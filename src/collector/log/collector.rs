//! Log stream source.
//!
//! Lists the available log streams, polls each one concurrently and feeds
//! the buffers into a [`WatermarkTracker`].

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::watermark::WatermarkTracker;
use crate::client::PaperlessApi;
use crate::collector::{CollectContext, Sink, Source, SourceError, default_concurrency_limit};
use crate::metric::Descriptor;

/// Source id used for enablement.
pub const LOG_SOURCE_ID: &str = "log";

/// Counts log entries per stream, module and level.
pub struct LogSource {
    api: Arc<dyn PaperlessApi>,
    tracker: Arc<WatermarkTracker>,
    concurrency_limit: usize,
    total_desc: Arc<Descriptor>,
}

impl LogSource {
    pub fn new(api: Arc<dyn PaperlessApi>) -> Self {
        Self {
            api,
            tracker: Arc::new(WatermarkTracker::new()),
            concurrency_limit: default_concurrency_limit(),
            total_desc: Descriptor::counter(
                "paperless_log_entries_total",
                "Best-effort count of log entries.",
                &["name", "module", "level"],
            ),
        }
    }

    /// Limit how many streams are fetched at the same time.
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit.max(1);
        self
    }

    pub fn tracker(&self) -> &WatermarkTracker {
        &self.tracker
    }

    /// Poll every stream, stopping the others on the first hard failure.
    async fn poll_streams(&self, ctx: &CollectContext, names: Vec<String>) -> Result<(), SourceError> {
        let child = ctx.child();
        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let mut tasks = JoinSet::new();

        for name in names {
            let api = Arc::clone(&self.api);
            let tracker = Arc::clone(&self.tracker);
            let semaphore = Arc::clone(&semaphore);
            let ctx = child.clone();

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| SourceError::Cancelled)?;

                let entries = ctx
                    .run(async {
                        match api.get_log(&name).await {
                            Ok(entries) => Ok(entries),
                            Err(e) if e.is_not_found() => {
                                tracing::debug!(stream = %name, "Log stream not found");
                                Ok(Vec::new())
                            }
                            Err(source) => Err(SourceError::Log {
                                name: name.clone(),
                                source,
                            }),
                        }
                    })
                    .await?;

                let fresh = tracker.observe(&name, &entries);
                tracing::trace!(stream = %name, entries = entries.len(), fresh, "Log stream polled");
                Ok(())
            });
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    if first_error.is_none() {
                        child.token().cancel();
                        first_error = Some(err);
                    }
                }
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => tracing::debug!(error = %e, "Log poll task cancelled"),
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for LogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSource")
            .field("concurrency_limit", &self.concurrency_limit)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Source for LogSource {
    fn id(&self) -> &'static str {
        LOG_SOURCE_ID
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        vec![Arc::clone(&self.total_desc)]
    }

    async fn collect(&self, ctx: &CollectContext, sink: &Sink) -> Result<(), SourceError> {
        let names = ctx
            .run(async { self.api.list_logs().await.map_err(SourceError::ListLogs) })
            .await?;

        self.poll_streams(ctx, names).await?;

        for ((stream, module, level), total) in self.tracker.totals() {
            sink.emit(&self.total_desc, total as f64, &[stream.as_str(), module.as_str(), level.as_str()])
                .await?;
        }

        Ok(())
    }
}
