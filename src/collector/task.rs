//! Background task list.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::client::PaperlessApi;
use crate::collector::{CollectContext, Sink, Source, SourceError};
use crate::metric::{Descriptor, optional_timestamp};

/// Status name that is always reported by `paperless_task_status_info`.
const DEFAULT_STATUS: &str = "success";

/// Reports every task known to the task queue.
pub struct TaskSource {
    api: Arc<dyn PaperlessApi>,
    info_desc: Arc<Descriptor>,
    created_desc: Arc<Descriptor>,
    done_desc: Arc<Descriptor>,
    status_desc: Arc<Descriptor>,
    filename_desc: Arc<Descriptor>,
    status_info_desc: Arc<Descriptor>,
    /// Every status name seen since startup, lowercased.
    seen_statuses: Mutex<BTreeSet<String>>,
}

impl TaskSource {
    pub fn new(api: Arc<dyn PaperlessApi>) -> Self {
        Self {
            api,
            info_desc: Descriptor::gauge(
                "paperless_task_info",
                "Static information about a task.",
                &["id", "task_id", "type"],
            ),
            created_desc: Descriptor::gauge(
                "paperless_task_created_timestamp_seconds",
                "Number of seconds since 1970 of the task creation.",
                &["id"],
            ),
            done_desc: Descriptor::gauge(
                "paperless_task_done_timestamp_seconds",
                "Number of seconds since 1970 of when the task finished.",
                &["id"],
            ),
            status_desc: Descriptor::gauge("paperless_task_status", "Task status.", &["id", "status"]),
            filename_desc: Descriptor::gauge(
                "paperless_task_filename",
                "Filename associated with the task (if any).",
                &["id", "filename"],
            ),
            status_info_desc: Descriptor::gauge(
                "paperless_task_status_info",
                "Task status names.",
                &["status"],
            ),
            seen_statuses: Mutex::new(BTreeSet::from([DEFAULT_STATUS.to_string()])),
        }
    }

    /// Canonical label value for `status`, remembering it for the info gauge.
    fn track_status(&self, status: &str) -> String {
        let status = status.to_lowercase();
        self.seen_statuses.lock().insert(status.clone());
        status
    }
}

impl std::fmt::Debug for TaskSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSource")
            .field("seen_statuses", &self.seen_statuses.lock().len())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Source for TaskSource {
    fn id(&self) -> &'static str {
        "task"
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        vec![
            Arc::clone(&self.status_info_desc),
            Arc::clone(&self.info_desc),
            Arc::clone(&self.created_desc),
            Arc::clone(&self.done_desc),
            Arc::clone(&self.status_desc),
            Arc::clone(&self.filename_desc),
        ]
    }

    async fn collect(&self, ctx: &CollectContext, sink: &Sink) -> Result<(), SourceError> {
        let tasks = ctx.run(self.api.list_tasks()).await?;

        for task in &tasks {
            let id = task.id.to_string();
            let id = id.as_str();
            let status = self.track_status(&task.status);
            let filename = task.task_file_name.as_deref().unwrap_or_default();

            sink.emit(&self.info_desc, 1.0, &[id, task.task_id.as_str(), task.kind.as_str()])
                .await?;
            sink.emit(&self.created_desc, optional_timestamp(task.created.as_ref()), &[id])
                .await?;
            sink.emit(&self.done_desc, optional_timestamp(task.done.as_ref()), &[id])
                .await?;
            sink.emit(&self.status_desc, 1.0, &[id, status.as_str()])
                .await?;
            sink.emit(&self.filename_desc, 1.0, &[id, filename])
                .await?;
        }

        let statuses: Vec<String> = self.seen_statuses.lock().iter().cloned().collect();
        for status in &statuses {
            sink.emit(&self.status_info_desc, 1.0, &[status.as_str()])
                .await?;
        }

        Ok(())
    }
}
