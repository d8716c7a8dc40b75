//! Search execution against a [`DocumentStore`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::{ExecutionError, Projector, SearchError};
use crate::config::Settings;
use crate::models::{FieldSet, Metadata, Projection, Query, QueryLimits, ResultEnvelope};
use crate::plan::{compile, Plan};
use crate::store::{open_store, DocumentStore, SearchHits, StoreError};
use crate::utils::parse_paper_identifier;

/// Read-only search service shared by every request
#[derive(Debug, Clone)]
pub struct SearchService {
    store: Arc<dyn DocumentStore>,
    projector: Projector,
    limits: QueryLimits,
    store_timeout: Duration,
}

impl SearchService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        projector: Projector,
        limits: QueryLimits,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            projector,
            limits,
            store_timeout,
        }
    }

    /// Open the configured store and build a service around it
    pub fn from_settings(settings: &Settings) -> Result<Self, StoreError> {
        let store = open_store(&settings.store)?;
        tracing::info!("Using {} document store", store.id());
        Ok(Self::new(
            store,
            Projector::from_config(&settings.urls),
            settings.search.limits(),
            settings.store.timeout(),
        ))
    }

    pub fn store_id(&self) -> &str {
        self.store.id()
    }

    /// Parse raw request parameters into a validated query
    pub fn parse_query<I, K, V>(&self, pairs: I) -> Result<Query, SearchError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Ok(Query::from_pairs(pairs, &self.limits)?)
    }

    /// Run a store call under the configured timeout
    async fn call<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, SearchError> {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::warn!(store = self.store.id(), operation, error = %e, "store call failed");
                Err(e.into())
            }
            Err(_) => {
                tracing::warn!(
                    store = self.store.id(),
                    operation,
                    timeout_ms = self.store_timeout.as_millis() as u64,
                    "store call timed out"
                );
                Err(ExecutionError::Timeout(format!(
                    "{} did not finish within {} ms",
                    operation,
                    self.store_timeout.as_millis()
                ))
                .into())
            }
        }
    }

    /// Documents `[start, start + size)` of the plan's matches in the plan's order
    pub async fn execute(&self, plan: &Plan, start: usize, size: usize) -> Result<SearchHits, SearchError> {
        let hits = self.call("search", self.store.search(plan, start, size)).await?;
        if hits.documents.len() > size {
            return Err(ExecutionError::Corrupt(format!(
                "store returned {} documents for a page of {}",
                hits.documents.len(),
                size
            ))
            .into());
        }
        Ok(hits)
    }

    /// Run a validated query and build the response envelope
    pub async fn search(&self, query: &Query) -> Result<ResultEnvelope, SearchError> {
        let plan = compile(query, self.store.capabilities())?;
        let hits = self.execute(&plan, query.start, query.size).await?;

        let latest = if query.include.contains(FieldSet::LATEST) && !hits.documents.is_empty() {
            let ids: Vec<String> = hits.documents.iter().map(|d| d.paper_id.clone()).collect();
            self.call("latest_versions", self.store.latest_versions(&ids)).await?
        } else {
            HashMap::new()
        };

        let results = hits
            .documents
            .iter()
            .map(|doc| self.projector.project(doc, query.include, latest.get(&doc.paper_id)))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            total = hits.total,
            returned = results.len(),
            start = query.start,
            "search completed"
        );

        Ok(ResultEnvelope::new(
            Metadata {
                start: query.start,
                size: query.size,
                total: hits.total,
                query: query.applied_parameters(),
            },
            results,
        ))
    }

    /// Parse and run raw request parameters
    pub async fn search_pairs<I, K, V>(&self, pairs: I) -> Result<ResultEnvelope, SearchError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let query = self.parse_query(pairs)?;
        self.search(&query).await
    }

    /// Look up one paper by identifier and project every field
    pub async fn get(&self, raw_id: &str) -> Result<Projection, SearchError> {
        let id = parse_paper_identifier(raw_id)?;

        let found = match id.version {
            Some(version) => {
                self.call("get_version", self.store.get_version(&id.paper_id, version))
                    .await?
            }
            None => self.call("get_latest", self.store.get_latest(&id.paper_id)).await?,
        };
        let doc = found.ok_or_else(|| SearchError::NotFound(id.display_id()))?;

        let latest = if id.version.is_none() || doc.is_current {
            Some(doc.clone())
        } else {
            self.call("get_latest", self.store.get_latest(&doc.paper_id)).await?
        };

        tracing::debug!(paper_id_v = %doc.paper_id_v, "document lookup");
        Ok(self.projector.project_full(&doc, latest.as_ref())?)
    }

    /// Whether the store answers a health probe in time
    pub async fn health(&self) -> Result<(), SearchError> {
        self.call("health", self.store.health()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Classification, Document, DocumentBuilder};
    use crate::plan::FilterCapabilities;
    use crate::store::{MemoryStore, MockStore};
    use crate::utils::ValidationError;
    use chrono::DateTime;

    fn date(s: &str) -> chrono::DateTime<chrono::FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    fn corpus() -> Vec<Document> {
        vec![
            DocumentBuilder::new("1811.00536", 1, "Muon g-2", date("2018-11-01T12:00:00-04:00"))
                .primary(Classification::new("grp_physics", "hep-ex", "hep-ex"))
                .current(false)
                .build(),
            DocumentBuilder::new("1811.00536", 2, "Muon g-2 (revised)", date("2018-12-01T12:00:00-05:00"))
                .primary(Classification::new("grp_physics", "hep-ex", "hep-ex"))
                .build(),
            DocumentBuilder::new("hep-th/9901001", 1, "Strings", date("1999-01-04T12:00:00-05:00"))
                .primary(Classification::new("grp_physics", "hep-th", "hep-th"))
                .build(),
        ]
    }

    fn service_with(store: Arc<dyn DocumentStore>) -> SearchService {
        SearchService::new(
            store,
            Projector::new("https://arxiv.org/abs", "http://localhost:8080"),
            QueryLimits::default(),
            Duration::from_millis(200),
        )
    }

    fn service() -> SearchService {
        service_with(Arc::new(MemoryStore::new(corpus()).unwrap()))
    }

    #[tokio::test]
    async fn test_search_envelope() {
        let envelope = service()
            .search_pairs([("primary_classification", "grp_physics"), ("size", "2")])
            .await
            .unwrap();
        assert_eq!(envelope.metadata.total, 3);
        assert_eq!(envelope.metadata.size, 2);
        assert_eq!(envelope.results.len(), 2);
        assert_eq!(envelope.results[0]["paper_id_v"], "1811.00536v2");
        assert_eq!(envelope.metadata.query.len(), 1);
    }

    #[tokio::test]
    async fn test_search_attaches_latest_when_included() {
        let envelope = service()
            .search_pairs([("paper_id", "1811.00536v1"), ("include", "latest")])
            .await
            .unwrap();
        assert_eq!(envelope.results[0]["latest"]["version"], 2);
    }

    #[tokio::test]
    async fn test_latest_lookup_is_one_store_call() {
        let docs: Vec<Document> = (0..40)
            .map(|i| {
                DocumentBuilder::new(format!("2001.{:05}", i), 1, "Paper", date("2020-01-15T12:00:00Z")).build()
            })
            .collect();
        let store = Arc::new(MockStore::new(docs).unwrap());
        let s = service_with(store.clone());

        let envelope = s.search_pairs([("size", "40"), ("include", "latest")]).await.unwrap();
        assert_eq!(envelope.results.len(), 40);
        assert!(envelope.results.iter().all(|r| r["latest"]["version"] == 1));
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test]
    async fn test_search_ascending_order() {
        let envelope = service()
            .search_pairs([("order", "submitted_date")])
            .await
            .unwrap();
        let ids: Vec<_> = envelope.results.iter().map(|r| r["paper_id_v"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["hep-th/9901001v1", "1811.00536v1", "1811.00536v2"]);
    }

    #[tokio::test]
    async fn test_search_is_idempotent() {
        let s = service();
        let a = s.search_pairs([("title", "muon")]).await.unwrap();
        let b = s.search_pairs([("title", "muon")]).await.unwrap();
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }

    #[tokio::test]
    async fn test_get_versioned_and_unversioned() {
        let s = service();
        let v1 = s.get("1811.00536v1").await.unwrap();
        assert_eq!(v1["version"], 1);
        assert_eq!(v1["latest"]["version"], 2);
        assert_eq!(v1["title"], "Muon g-2");

        let current = s.get("arXiv:1811.00536").await.unwrap();
        assert_eq!(current["version"], 2);

        let old_style = s.get("hep-th/9901001").await.unwrap();
        assert_eq!(old_style["canonical"], "https://arxiv.org/abs/hep-th/9901001v1");
    }

    #[tokio::test]
    async fn test_get_errors() {
        let s = service();
        assert_eq!(
            s.get("1811.00536v7").await.unwrap_err(),
            SearchError::NotFound("1811.00536v7".into())
        );
        assert!(matches!(s.get("1811.99999").await, Err(SearchError::NotFound(_))));
        assert!(matches!(
            s.get("not-an-id").await,
            Err(SearchError::Validation(ValidationError::InvalidPaperId(_)))
        ));
    }

    #[tokio::test]
    async fn test_store_timeout() {
        let store = Arc::new(MockStore::new(corpus()).unwrap());
        store.set_delay(Duration::from_secs(5));
        let err = service_with(store).search_pairs([("title", "muon")]).await.unwrap_err();
        assert!(matches!(err, SearchError::Execution(ExecutionError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_store_failure_is_not_retried() {
        let store = Arc::new(MockStore::new(corpus()).unwrap());
        store.set_failure(StoreError::Unavailable("down".into()));
        let s = service_with(store.clone());

        let err = s.search_pairs(Vec::<(String, String)>::new()).await.unwrap_err();
        assert!(matches!(err, SearchError::Execution(ExecutionError::Unavailable(_))));
        assert_eq!(store.calls(), 1);
        assert!(s.health().await.is_err());
    }

    #[tokio::test]
    async fn test_unsupported_filter_never_reaches_store() {
        let store = Arc::new(
            MockStore::new(corpus())
                .unwrap()
                .with_capabilities(FilterCapabilities::all() - FilterCapabilities::ORCID),
        );
        let s = service_with(store.clone());

        let err = s.search_pairs([("orcid", "0000-*")]).await.unwrap_err();
        assert!(matches!(err, SearchError::Compile(_)));
        assert_eq!(store.calls(), 0);
    }
}
