//! Core source traits and types.

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::ClientError;
use crate::metric::{Descriptor, Measurement};

/// Errors that end a source's contribution to a collection cycle.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The upstream API call failed.
    #[error(transparent)]
    Api(#[from] ClientError),

    /// Listing log stream names failed.
    #[error("listing log names: {0}")]
    ListLogs(#[source] ClientError),

    /// Fetching a single log stream failed.
    #[error("log {name}: {source}")]
    Log {
        name: String,
        #[source]
        source: ClientError,
    },

    /// The cycle was cancelled before the source finished.
    #[error("collection cancelled")]
    Cancelled,

    /// The merge sink was closed while the source was still writing.
    #[error("output sink closed")]
    SinkClosed,
}

/// Category of a non-fatal collection warning.
///
/// Ordering follows the category name so that warning output is stable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, AsRefStr, EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum WarningCategory {
    /// Fetching the remote version failed.
    GetRemoteVersion,
    /// Catch-all category; always reported, even at zero.
    Unspecified,
}

/// Non-fatal partial failure reported by a source.
#[derive(Debug)]
pub struct Warning {
    pub category: WarningCategory,
    pub error: Box<dyn StdError + Send + Sync>,
}

impl Warning {
    pub fn new(category: WarningCategory, error: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self {
            category,
            error: error.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.error)
    }
}

/// Element travelling through the merge sink.
#[derive(Debug)]
pub enum Item {
    Measurement(Measurement),
    Warning(Warning),
}

/// Write end of the merge point shared by all sources of a cycle.
///
/// Sends wait for the aggregation task to take the previous item, which
/// bounds memory regardless of how many sources run.
#[derive(Debug, Clone)]
pub struct Sink {
    tx: mpsc::Sender<Item>,
}

impl Sink {
    /// Create a sink and its receiving end with the given buffer depth.
    ///
    /// # Panics
    /// Panics if `depth` is zero.
    pub fn channel(depth: usize) -> (Self, mpsc::Receiver<Item>) {
        let (tx, rx) = mpsc::channel(depth);
        (Self { tx }, rx)
    }

    /// Write a measurement.
    pub async fn send(&self, measurement: Measurement) -> Result<(), SourceError> {
        self.tx
            .send(Item::Measurement(measurement))
            .await
            .map_err(|_| SourceError::SinkClosed)
    }

    /// Write a warning.
    pub async fn warn(&self, warning: Warning) -> Result<(), SourceError> {
        self.tx
            .send(Item::Warning(warning))
            .await
            .map_err(|_| SourceError::SinkClosed)
    }

    /// Write a gauge or counter value for `desc`.
    pub async fn emit(
        &self,
        desc: &Arc<Descriptor>,
        value: f64,
        label_values: &[&str],
    ) -> Result<(), SourceError> {
        self.send(Measurement::new(desc, value, label_values)).await
    }
}

/// Cancellable execution context of one collection cycle.
///
/// Cancellation is advisory: sources observe it through [`CollectContext::run`]
/// or [`CollectContext::is_cancelled`], nothing aborts them forcibly.
#[derive(Debug, Clone, Default)]
pub struct CollectContext {
    token: CancellationToken,
}

impl CollectContext {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Derive a context that is cancelled with this one but can also be
    /// cancelled on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    /// Await `fut` unless the context is cancelled first.
    pub async fn run<F, T, E>(&self, fut: F) -> Result<T, SourceError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<SourceError>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(SourceError::Cancelled),
            result = fut => result.map_err(Into::into),
        }
    }
}

/// A producer of measurements for one facet of the monitored system.
///
/// # Error Handling Philosophy
///
/// `collect()` distinguishes **partial failures** from **source failures**:
///
/// - **Partial failures** (one of several calls failed, the rest succeeded):
///   write a [`Warning`] to the sink and return `Ok(())`.
/// - **Source failures** (nothing valid can be produced this cycle, e.g. the
///   API is unreachable): return `Err(SourceError)`. The orchestrator then
///   cancels the cycle and reports it as failed.
#[async_trait::async_trait]
pub trait Source: Send + Sync + 'static {
    /// Stable identifier used for enablement. Unique per orchestrator.
    fn id(&self) -> &'static str;

    /// Every descriptor this source can ever emit. Must be side-effect free.
    fn describe(&self) -> Vec<Arc<Descriptor>>;

    /// Perform one collection cycle, writing into `sink`.
    async fn collect(&self, ctx: &CollectContext, sink: &Sink) -> Result<(), SourceError>;
}
