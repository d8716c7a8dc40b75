//! Document stores that evaluate compiled plans.
//!
//! This module defines the [`DocumentStore`] trait that every backing store
//! implements. Two backends ship with the crate:
//!
//! - [`MemoryStore`]: an immutable in-process snapshot loaded from a JSON or
//!   JSON-lines file; plans are evaluated directly against it.
//! - [`ElasticsearchStore`]: translates plans into the Elasticsearch query DSL
//!   and issues them over HTTP.
//!
//! Stores are read-only. A store may decline filters it cannot evaluate by
//! narrowing [`DocumentStore::capabilities`]; the compiler then rejects such
//! queries before they reach the store.

mod elasticsearch;
mod memory;
pub mod mock;

pub use elasticsearch::ElasticsearchStore;
pub use memory::MemoryStore;
pub use mock::MockStore;

use async_trait::async_trait;
use futures_util::{stream, StreamExt, TryStreamExt};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::{StoreBackend, StoreConfig};
use crate::models::{Document, SortOrder};
use crate::plan::{FilterCapabilities, Plan};

/// Upper bound on concurrent `get_latest` calls made by the default
/// [`DocumentStore::latest_versions`]
pub const LATEST_LOOKUP_CONCURRENCY: usize = 8;

/// One page of matching documents plus the full match count
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHits {
    pub documents: Vec<Document>,
    pub total: usize,
}

impl SearchHits {
    pub fn empty(total: usize) -> Self {
        Self {
            documents: Vec::new(),
            total,
        }
    }
}

/// The DocumentStore trait defines the interface for all backing stores.
#[async_trait]
pub trait DocumentStore: Send + Sync + std::fmt::Debug {
    /// Short identifier used in logs, e.g. "memory", "elasticsearch"
    fn id(&self) -> &str;

    /// Filter fields this store can evaluate
    fn capabilities(&self) -> FilterCapabilities {
        FilterCapabilities::all()
    }

    /// Evaluate a plan and return documents `[start, start + size)` in
    /// the plan's order, together with the total match count
    async fn search(&self, plan: &Plan, start: usize, size: usize) -> Result<SearchHits, StoreError>;

    /// Fetch an exact paper version
    async fn get_version(&self, paper_id: &str, version: u32) -> Result<Option<Document>, StoreError>;

    /// Fetch the current version of a paper, or its highest version when
    /// none is marked current
    async fn get_latest(&self, paper_id: &str) -> Result<Option<Document>, StoreError>;

    /// Latest versions for several papers, keyed by `paper_id`.
    ///
    /// The default issues one [`get_latest`](Self::get_latest) per distinct
    /// id, at most [`LATEST_LOOKUP_CONCURRENCY`] at a time. Stores that can
    /// answer in a single round trip should override it.
    async fn latest_versions(&self, paper_ids: &[String]) -> Result<HashMap<String, Document>, StoreError> {
        let found: Vec<Option<Document>> = stream::iter(unique_ids(paper_ids).into_iter().map(str::to_owned))
            .map(|id: String| async move { self.get_latest(&id).await })
            .buffer_unordered(LATEST_LOOKUP_CONCURRENCY)
            .try_collect()
            .await?;
        Ok(found
            .into_iter()
            .flatten()
            .map(|doc| (doc.paper_id.clone(), doc))
            .collect())
    }

    /// Probe whether the store can serve requests
    async fn health(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Errors that can occur when talking to a store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store did not answer in time
    #[error("Store timed out: {0}")]
    Timeout(String),

    /// Network failure or an error status from the store
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store answered with data that could not be understood
    #[error("Store returned malformed data: {0}")]
    Corrupt(String),

    /// The store refused to evaluate the query
    #[error("Query rejected by store: {0}")]
    InvalidQuery(String),

    /// IO error (loading a snapshot file)
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Timeout(err.to_string())
        } else if err.is_decode() {
            StoreError::Corrupt(err.to_string())
        } else {
            StoreError::Unavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Corrupt(format!("JSON: {}", err))
    }
}

/// Default result order: most recently submitted first, then `paper_id_v`
/// descending
pub fn default_order(a: &Document, b: &Document) -> Ordering {
    SortOrder::default().compare(a, b)
}

/// Distinct ids in first-seen order
pub(crate) fn unique_ids(paper_ids: &[String]) -> Vec<&str> {
    let mut seen = HashSet::with_capacity(paper_ids.len());
    paper_ids
        .iter()
        .map(String::as_str)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Open the store selected by configuration
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => {
            let store = match &config.path {
                Some(path) => MemoryStore::load(path)?,
                None => {
                    tracing::warn!("No store path configured; serving an empty in-memory store");
                    MemoryStore::new(Vec::new())?
                }
            };
            Ok(Arc::new(store))
        }
        StoreBackend::Elasticsearch => Ok(Arc::new(ElasticsearchStore::new(config)?)),
    }
}
