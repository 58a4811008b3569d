//! Concurrent collection cycle over a fixed set of sources.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::default_concurrency_limit;
use super::traits::{CollectContext, Item, Sink, Source, SourceError, WarningCategory};
use crate::metric::{Descriptor, InvalidMeasurement, Measurement, Sample};

/// Buffer depth of the merge sink. tokio has no rendezvous channel, so one
/// slot is the closest to unbuffered.
const SINK_DEPTH: usize = 1;

/// Name of the per-category warning gauge.
pub const WARNINGS_METRIC: &str = "paperless_warnings_total";

/// Name of the descriptor attached to the invalid marker of a failed cycle.
pub const ERROR_METRIC: &str = "paperless_error";

/// Errors that make a collection cycle fail.
#[derive(Debug, Error)]
pub enum CollectError {
    /// A source returned a terminal failure.
    #[error("{id}: {source}")]
    Source {
        id: &'static str,
        #[source]
        source: SourceError,
    },

    /// The cycle deadline elapsed before all sources finished.
    #[error("collection deadline exceeded")]
    DeadlineExceeded,

    /// The aggregation task did not complete.
    #[error("aggregation failed: {0}")]
    Aggregation(String),
}

/// Fans a collection cycle out to all registered sources.
///
/// Each cycle runs every source in its own task, at most
/// `concurrency_limit` at a time, under one shared deadline. Output is
/// merged through a single [`Sink`] and split by an aggregation task into
/// measurements and per-category warning counts.
pub struct Orchestrator {
    sources: Vec<Arc<dyn Source>>,
    timeout: Option<Duration>,
    concurrency_limit: usize,
    warnings_desc: Arc<Descriptor>,
    error_desc: Arc<Descriptor>,
    span: tracing::Span,
}

impl Orchestrator {
    pub fn new(sources: Vec<Arc<dyn Source>>) -> Self {
        Self {
            sources,
            timeout: None,
            concurrency_limit: default_concurrency_limit(),
            warnings_desc: Descriptor::gauge(
                WARNINGS_METRIC,
                "Number of warnings generated while scraping metrics.",
                &["category"],
            ),
            error_desc: Descriptor::gauge(ERROR_METRIC, "Metrics collection failed", &[]),
            span: tracing::info_span!("orchestrator"),
        }
    }

    /// Bound each cycle by `timeout`. A zero duration means no bound.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Limit how many sources collect at the same time.
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit.max(1);
        self
    }

    /// Parent span for all log output of this orchestrator.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    /// Ids of the registered sources, in registration order.
    pub fn source_ids(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.id()).collect()
    }

    /// Every descriptor a cycle may emit, excluding the invalid marker.
    ///
    /// Never calls `collect` on any source.
    pub fn describe(&self) -> Vec<Arc<Descriptor>> {
        let mut descs = vec![Arc::clone(&self.warnings_desc)];
        for source in &self.sources {
            descs.extend(source.describe());
        }
        descs
    }

    /// Run one collection cycle.
    ///
    /// Always returns: measurements forwarded from the sources, one warning
    /// count per category (sorted, `unspecified` always present) and, if the
    /// cycle failed or timed out, a trailing [`Sample::Invalid`] marker.
    pub async fn collect(&self) -> Vec<Sample> {
        let ctx = CollectContext::new(CancellationToken::new());
        let (sink, rx) = Sink::channel(SINK_DEPTH);

        let aggregator = tokio::spawn(aggregate(rx).instrument(self.span.clone()));

        let mut result = self.run_sources(&ctx, sink).await;
        ctx.token().cancel();

        let mut samples = Vec::new();
        match aggregator.await {
            Ok(aggregate) => {
                samples.reserve(aggregate.measurements.len() + aggregate.warnings.len() + 1);
                samples.extend(aggregate.measurements.into_iter().map(Sample::from));

                for (category, messages) in &aggregate.warnings {
                    let category = category.to_string();
                    samples.push(Sample::from(Measurement::new(
                        &self.warnings_desc,
                        messages.len() as f64,
                        &[category.as_str()],
                    )));
                }
            }
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                if result.is_ok() {
                    result = Err(CollectError::Aggregation(e.to_string()));
                }
            }
        }

        if let Err(err) = result {
            self.span.in_scope(|| match &err {
                CollectError::DeadlineExceeded => {
                    tracing::warn!(timeout = ?self.timeout, "Metrics collection timed out");
                }
                _ => tracing::error!(error = %err, "Metrics collection failed"),
            });

            samples.push(Sample::Invalid(InvalidMeasurement {
                desc: Arc::clone(&self.error_desc),
                error: err.to_string(),
            }));
        }

        samples
    }

    async fn run_sources(&self, ctx: &CollectContext, sink: Sink) -> Result<(), CollectError> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency_limit));
        let mut tasks = JoinSet::new();

        for source in &self.sources {
            let source = Arc::clone(source);
            let ctx = ctx.clone();
            let sink = sink.clone();
            let semaphore = Arc::clone(&semaphore);
            let span = tracing::debug_span!(parent: &self.span, "source", id = source.id());

            tasks.spawn(
                async move {
                    let id = source.id();
                    let _permit = tokio::select! {
                        permit = semaphore.acquire_owned() => permit.map_err(|_| CollectError::Source {
                            id,
                            source: SourceError::Cancelled,
                        })?,
                        _ = ctx.token().cancelled() => {
                            tracing::debug!("Skipping source, cycle already cancelled");
                            return Ok(());
                        }
                    };

                    source
                        .collect(&ctx, &sink)
                        .await
                        .map_err(|source| CollectError::Source { id, source })
                }
                .instrument(span),
            );
        }

        // Tasks hold the remaining sink clones; the channel closes when the
        // last of them finishes.
        drop(sink);

        let mut first_error = None;
        let outcome = match self.timeout {
            Some(timeout) => {
                tokio::time::timeout(timeout, join_all(&mut tasks, ctx, &mut first_error))
                    .await
                    .ok()
            }
            None => Some(join_all(&mut tasks, ctx, &mut first_error).await),
        };

        if outcome.is_none() {
            ctx.token().cancel();
            tasks.shutdown().await;
        }

        match first_error {
            Some(err) => Err(err),
            None if outcome.is_none() => Err(CollectError::DeadlineExceeded),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("sources", &self.source_ids())
            .field("timeout", &self.timeout)
            .field("concurrency_limit", &self.concurrency_limit)
            .finish_non_exhaustive()
    }
}

/// Wait for every task, cancelling the cycle on the first terminal failure.
async fn join_all(
    tasks: &mut JoinSet<Result<(), CollectError>>,
    ctx: &CollectContext,
    first_error: &mut Option<CollectError>,
) {
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                if first_error.is_none() {
                    ctx.token().cancel();
                    *first_error = Some(err);
                } else {
                    tracing::debug!(error = %err, "Additional source failure after cancellation");
                }
            }
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => tracing::debug!(error = %e, "Source task cancelled"),
        }
    }
}

/// Per-cycle result of the aggregation task.
#[derive(Debug, Default)]
struct Aggregate {
    measurements: Vec<Measurement>,
    warnings: BTreeMap<WarningCategory, Vec<String>>,
}

/// Drain the merge sink until every writer is gone.
async fn aggregate(mut rx: mpsc::Receiver<Item>) -> Aggregate {
    let mut aggregate = Aggregate::default();
    aggregate
        .warnings
        .insert(WarningCategory::Unspecified, Vec::new());

    while let Some(item) = rx.recv().await {
        match item {
            Item::Measurement(m) => aggregate.measurements.push(m),
            Item::Warning(w) => aggregate
                .warnings
                .entry(w.category)
                .or_default()
                .push(w.error.to_string()),
        }
    }

    let msg = format_warnings(&aggregate.warnings);
    if !msg.is_empty() {
        tracing::warn!("Metrics collection warnings:\n{msg}");
    }

    aggregate
}

/// Render warning messages grouped by category, one line per category.
///
/// Categories and the messages within each are sorted; categories without
/// messages are omitted.
pub fn format_warnings(warnings: &BTreeMap<WarningCategory, Vec<String>>) -> String {
    let mut lines = Vec::new();

    for (category, messages) in warnings {
        if messages.is_empty() {
            continue;
        }

        let mut messages = messages.clone();
        messages.sort();
        lines.push(format!("{category}: {messages:?}"));
    }

    lines.join("\n")
}
