//! Mock store for testing failure paths.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::{DocumentStore, MemoryStore, SearchHits, StoreError};
use crate::models::Document;
use crate::plan::{FilterCapabilities, Plan};

/// A store that serves documents from memory but can be told to fail,
/// stall, or refuse filters.
#[derive(Debug)]
pub struct MockStore {
    inner: MemoryStore,
    capabilities: FilterCapabilities,
    failure: Mutex<Option<StoreError>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockStore {
    /// Create a mock store over the given documents.
    pub fn new(documents: Vec<Document>) -> Result<Self, StoreError> {
        Ok(Self {
            inner: MemoryStore::new(documents)?,
            capabilities: FilterCapabilities::all(),
            failure: Mutex::new(None),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }

    /// Restrict the filters this store claims to support.
    pub fn with_capabilities(mut self, capabilities: FilterCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Fail every subsequent call with `error`.
    pub fn set_failure(&self, error: StoreError) {
        *lock(&self.failure) = Some(error);
    }

    /// Sleep before answering every subsequent call.
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }

    /// Number of store calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn before_call(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match lock(&self.failure).clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DocumentStore for MockStore {
    fn id(&self) -> &str {
        "mock"
    }

    fn capabilities(&self) -> FilterCapabilities {
        self.capabilities
    }

    async fn search(&self, plan: &Plan, start: usize, size: usize) -> Result<SearchHits, StoreError> {
        self.before_call().await?;
        self.inner.search(plan, start, size).await
    }

    async fn get_version(&self, paper_id: &str, version: u32) -> Result<Option<Document>, StoreError> {
        self.before_call().await?;
        self.inner.get_version(paper_id, version).await
    }

    async fn get_latest(&self, paper_id: &str) -> Result<Option<Document>, StoreError> {
        self.before_call().await?;
        self.inner.get_latest(paper_id).await
    }

    async fn latest_versions(&self, paper_ids: &[String]) -> Result<HashMap<String, Document>, StoreError> {
        self.before_call().await?;
        self.inner.latest_versions(paper_ids).await
    }

    async fn health(&self) -> Result<(), StoreError> {
        self.before_call().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MockStore::new(Vec::new()).unwrap();
        assert!(store.health().await.is_ok());
        assert_eq!(store.search(&Plan::match_all(), 0, 10).await.unwrap(), SearchHits::empty(0));

        store.set_failure(StoreError::Unavailable("down".into()));
        assert_eq!(
            store.search(&Plan::match_all(), 0, 10).await.unwrap_err(),
            StoreError::Unavailable("down".into())
        );
        assert!(store.latest_versions(&["1811.00536".to_string()]).await.is_err());
        assert_eq!(store.calls(), 4);
    }

    #[test]
    fn test_capabilities_override() {
        let store = MockStore::new(Vec::new())
            .unwrap()
            .with_capabilities(FilterCapabilities::TITLE);
        assert_eq!(store.capabilities(), FilterCapabilities::TITLE);
    }
}
