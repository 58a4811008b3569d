//! Latest released version as reported by the Paperless instance.
//!
//! Paperless has to reach the public internet to answer this, so the source
//! is opt-in. By default it fetches once per collection cycle. With a
//! refresh interval it instead polls in a background task and every cycle
//! reports the last cached result without blocking on the network.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::client::{PaperlessApi, RemoteVersion};
use crate::collector::{CollectContext, Sink, Source, SourceError, Warning, WarningCategory};
use crate::metric::Descriptor;

/// Source id used for enablement.
pub const REMOTE_VERSION_ID: &str = "remote_version";

type Cached = Arc<Mutex<Option<Result<RemoteVersion, String>>>>;

enum Mode {
    PerCycle,
    Background(Cached),
}

/// Reports whether an update is available.
pub struct RemoteVersionSource {
    api: Arc<dyn PaperlessApi>,
    mode: Mode,
    update_available_desc: Arc<Descriptor>,
}

impl RemoteVersionSource {
    /// Fetch the remote version during every collection cycle.
    pub fn new(api: Arc<dyn PaperlessApi>) -> Self {
        Self {
            api,
            mode: Mode::PerCycle,
            update_available_desc: Descriptor::gauge(
                "paperless_remote_version_update_available",
                "Whether an update is available.",
                &["version"],
            ),
        }
    }

    /// Fetch the remote version every `interval` in a background task that
    /// stops when `shutdown` is cancelled.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_background_refresh(
        api: Arc<dyn PaperlessApi>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        let cache: Cached = Arc::new(Mutex::new(None));
        tokio::spawn(refresh_loop(
            Arc::clone(&api),
            Arc::clone(&cache),
            interval,
            shutdown,
        ));

        Self {
            mode: Mode::Background(cache),
            ..Self::new(api)
        }
    }

    async fn emit(
        &self,
        sink: &Sink,
        result: Option<Result<RemoteVersion, String>>,
    ) -> Result<(), SourceError> {
        let (update_available, version) = match result {
            Some(Ok(remote)) => (if remote.update_available { 1.0 } else { 0.0 }, remote.version),
            Some(Err(error)) => {
                sink.warn(Warning::new(WarningCategory::GetRemoteVersion, error))
                    .await?;
                (0.0, String::new())
            }
            None => (0.0, String::new()),
        };

        sink.emit(&self.update_available_desc, update_available, &[version.as_str()])
            .await
    }
}

impl std::fmt::Debug for RemoteVersionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.mode {
            Mode::PerCycle => "per_cycle",
            Mode::Background(_) => "background",
        };
        f.debug_struct("RemoteVersionSource")
            .field("mode", &mode)
            .finish_non_exhaustive()
    }
}

async fn fetch(api: &dyn PaperlessApi) -> Result<RemoteVersion, String> {
    api.get_remote_version()
        .await
        .map_err(|e| format!("fetching remote version: {e}"))
}

async fn refresh_loop(
    api: Arc<dyn PaperlessApi>,
    cache: Cached,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = fetch(api.as_ref()) => result,
        };

        if let Err(error) = &result {
            tracing::debug!(%error, "Remote version refresh failed");
        }
        *cache.lock() = Some(result);
    }

    tracing::debug!("Remote version refresh stopped");
}

#[async_trait::async_trait]
impl Source for RemoteVersionSource {
    fn id(&self) -> &'static str {
        REMOTE_VERSION_ID
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        vec![Arc::clone(&self.update_available_desc)]
    }

    async fn collect(&self, ctx: &CollectContext, sink: &Sink) -> Result<(), SourceError> {
        let result = match &self.mode {
            Mode::PerCycle => {
                let fetched = ctx
                    .run(async { Ok::<_, SourceError>(fetch(self.api.as_ref()).await) })
                    .await?;
                Some(fetched)
            }
            Mode::Background(cache) => cache.lock().clone(),
        };

        self.emit(sink, result).await
    }
}
