//! Tags, correspondents, document types and storage paths.

use std::sync::Arc;

use crate::client::{CatalogKind, PaperlessApi};
use crate::collector::{CollectContext, Sink, Source, SourceError};
use crate::metric::{Descriptor, optional_timestamp};

/// Reports every object of one catalog collection.
pub struct CatalogSource {
    api: Arc<dyn PaperlessApi>,
    kind: CatalogKind,
    info_desc: Arc<Descriptor>,
    doc_count_desc: Arc<Descriptor>,
    /// Correspondents only.
    last_correspondence_desc: Option<Arc<Descriptor>>,
}

impl CatalogSource {
    pub fn new(api: Arc<dyn PaperlessApi>, kind: CatalogKind) -> Self {
        let noun = kind.noun();

        let last_correspondence_desc = (kind == CatalogKind::Correspondent).then(|| {
            Descriptor::gauge(
                "paperless_correspondent_last_correspondence_timestamp_seconds",
                "Number of seconds since 1970 of the most recent correspondence.",
                &["id"],
            )
        });

        Self {
            api,
            kind,
            info_desc: Descriptor::gauge(
                format!("paperless_{kind}_info"),
                format!("Static information about a {noun}."),
                &["id", "name", "slug"],
            ),
            doc_count_desc: Descriptor::gauge(
                format!("paperless_{kind}_document_count"),
                format!("Number of documents associated with a {noun}."),
                &["id"],
            ),
            last_correspondence_desc,
        }
    }

    pub fn kind(&self) -> CatalogKind {
        self.kind
    }
}

impl std::fmt::Debug for CatalogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogSource")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Source for CatalogSource {
    fn id(&self) -> &'static str {
        self.kind.into()
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        let mut descs = vec![Arc::clone(&self.info_desc), Arc::clone(&self.doc_count_desc)];
        descs.extend(self.last_correspondence_desc.iter().cloned());
        descs
    }

    async fn collect(&self, ctx: &CollectContext, sink: &Sink) -> Result<(), SourceError> {
        let entries = ctx.run(self.api.list_catalog(self.kind)).await?;

        for entry in &entries {
            let id = entry.id.to_string();

            sink.emit(&self.info_desc, 1.0, &[id.as_str(), entry.name.as_str(), entry.slug.as_str()])
                .await?;
            sink.emit(&self.doc_count_desc, entry.document_count as f64, &[id.as_str()])
                .await?;

            if let Some(desc) = &self.last_correspondence_desc {
                let ts = optional_timestamp(entry.last_correspondence.as_ref());
                sink.emit(desc, ts, &[id.as_str()]).await?;
            }
        }

        Ok(())
    }
}
