//! Total item counts of documents, users and groups.

use std::sync::Arc;

use crate::client::{CountedResource, PaperlessApi};
use crate::collector::{CollectContext, Sink, Source, SourceError};
use crate::metric::Descriptor;

/// Reports the size of one list endpoint.
pub struct CountSource {
    api: Arc<dyn PaperlessApi>,
    resource: CountedResource,
    count_desc: Arc<Descriptor>,
}

impl CountSource {
    pub fn new(api: Arc<dyn PaperlessApi>, resource: CountedResource) -> Self {
        let (name, help) = match resource {
            CountedResource::Documents => ("paperless_documents", "Number of documents."),
            CountedResource::Users => ("paperless_users", "Number of users."),
            CountedResource::Groups => ("paperless_groups", "Number of user groups."),
        };

        Self {
            api,
            resource,
            count_desc: Descriptor::gauge(name, help, &[]),
        }
    }
}

impl std::fmt::Debug for CountSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountSource")
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Source for CountSource {
    fn id(&self) -> &'static str {
        match self.resource {
            CountedResource::Documents => "document",
            CountedResource::Users => "user",
            CountedResource::Groups => "group",
        }
    }

    fn describe(&self) -> Vec<Arc<Descriptor>> {
        vec![Arc::clone(&self.count_desc)]
    }

    async fn collect(&self, ctx: &CollectContext, sink: &Sink) -> Result<(), SourceError> {
        match ctx.run(self.api.count(self.resource)).await? {
            Some(count) => sink.emit(&self.count_desc, count as f64, &[]).await,
            None => {
                tracing::debug!(resource = %self.resource, "Item count unknown");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FakeApi, assert_described, collect_source};

    #[tokio::test]
    async fn test_collect_counts() {
        let api = Arc::new(FakeApi::new());
        {
            let mut counts = api.counts.lock();
            counts.insert(CountedResource::Documents, Some(123));
            counts.insert(CountedResource::Users, Some(4));
            counts.insert(CountedResource::Groups, Some(0));
        }

        for (resource, id, name, value) in [
            (CountedResource::Documents, "document", "paperless_documents", 123.0),
            (CountedResource::Users, "user", "paperless_users", 4.0),
            (CountedResource::Groups, "group", "paperless_groups", 0.0),
        ] {
            let source = CountSource::new(Arc::clone(&api) as Arc<dyn PaperlessApi>, resource);
            assert_eq!(source.id(), id);

            let collected = collect_source(&source).await.unwrap();
            assert_described(&source, &collected);
            assert_eq!(collected.value(name), Some(value));
        }
    }

    #[tokio::test]
    async fn test_unknown_count_emits_nothing() {
        let api = Arc::new(FakeApi::new());
        api.counts.lock().insert(CountedResource::Documents, None);

        let source = CountSource::new(api, CountedResource::Documents);
        let collected = collect_source(&source).await.unwrap();
        assert!(collected.measurements.is_empty());
    }

    #[tokio::test]
    async fn test_request_failure() {
        let api = Arc::new(FakeApi::new());
        let source = CountSource::new(api, CountedResource::Users);

        let err = collect_source(&source).await.unwrap_err();
        assert!(matches!(err, SourceError::Api(_)));
    }
}
