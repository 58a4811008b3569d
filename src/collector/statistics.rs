//! Document statistics.

use std::sync::Arc;

use crate::client::PaperlessApi;
use crate::collector::{CollectContext, Sink, Source, SourceError};
use crate::metric::Descriptor;

/// Reports `/api/statistics/`.
pub struct StatisticsSource {
    api: Arc<dyn PaperlessApi>,
    documents_total: Arc<Descriptor>,
    documents_inbox: Arc<Descriptor>,
    file_type_counts: Arc<Descriptor>,
    character_count: Arc<Descriptor>,
    tag_count: Arc<Descriptor>,
    correspondent_count: Arc<Descriptor>,
    document_type_count: Arc<Descriptor>,
    storage_path_count: Arc<Descriptor>,
}

impl StatisticsSource {
    pub fn new(api: Arc<dyn PaperlessApi>) -> Self {
        let gauge = |name: &str, help: &str| {
            Descriptor::gauge(format!("paperless_statistics_{name}"), help, &[])
        };

        Self {
            api,
            documents_total: gauge("documents_total", "Total number of documents."),
            documents_inbox: gauge(
                "documents_inbox_count",
                "Total number of documents that have the defined 'Inbox' tag.",
            ),
            file_type_counts: Descriptor::gauge(
                "paperless_statistics_documents_file_type_counts",
                "Total number of documents per MIME type.",
                &["mime_type"],
            ),
            character_count: gauge(
                "character_count",
                "Number of characters stored across the total number of documents.",
            ),
            tag_count: gauge("tag_count", "Total number of tags."),
            correspondent_count: gauge("correspondent_count", "Total number of correspondents."),
            document_type_count: gauge("document_type_count", "Total number of document types."),
            storage_path_count: gauge("storage_path_count", "Total number of storage paths."),
        }
    }
}

impl std::fmt::Debug for StatisticsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatisticsSource").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Source for StatisticsSource {
    fn id(&self) -> &'static str {
        "statistics"
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        [
            &self.documents_total,
            &self.documents_inbox,
            &self.file_type_counts,
            &self.character_count,
            &self.tag_count,
            &self.correspondent_count,
            &self.document_type_count,
            &self.storage_path_count,
        ]
        .into_iter()
        .map(Arc::clone)
        .collect()
    }

    async fn collect(&self, ctx: &CollectContext, sink: &Sink) -> Result<(), SourceError> {
        let stats = ctx.run(self.api.get_statistics()).await?;

        sink.emit(&self.documents_total, stats.documents_total as f64, &[])
            .await?;
        sink.emit(
            &self.documents_inbox,
            stats.documents_inbox.unwrap_or_default() as f64,
            &[],
        )
        .await?;

        for file_type in &stats.document_file_type_counts {
            sink.emit(
                &self.file_type_counts,
                file_type.mime_type_count as f64,
                &[file_type.mime_type.as_str()],
            )
            .await?;
        }

        let totals = [
            (&self.character_count, stats.character_count.unwrap_or_default()),
            (&self.tag_count, stats.tag_count),
            (&self.correspondent_count, stats.correspondent_count),
            (&self.document_type_count, stats.document_type_count),
            (&self.storage_path_count, stats.storage_path_count),
        ];
        for (desc, value) in totals {
            sink.emit(desc, value as f64, &[]).await?;
        }

        Ok(())
    }
}
