//! Shapes stored documents into response projections.

use serde_json::Value;

use super::ExecutionError;
use crate::config::UrlConfig;
use crate::models::{Document, FieldSet, Projection};

/// Builds projections and derived links from configured base URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projector {
    canonical_base: String,
    api_base: String,
}

impl Projector {
    pub fn new(canonical_base: &str, api_base: &str) -> Self {
        Self {
            canonical_base: canonical_base.trim_end_matches('/').to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(urls: &UrlConfig) -> Self {
        Self::new(&urls.canonical_base, &urls.api_base)
    }

    /// Public abstract page for a paper version
    pub fn canonical(&self, paper_id_v: &str) -> String {
        format!("{}/{}", self.canonical_base, paper_id_v)
    }

    /// API location of a paper version
    pub fn href(&self, paper_id_v: &str) -> String {
        format!("{}/{}", self.api_base, paper_id_v)
    }

    /// Project `doc` with the always-present fields plus `include`.
    ///
    /// `latest` is attached only when `include` asks for it and a latest
    /// version is known.
    pub fn project(
        &self,
        doc: &Document,
        include: FieldSet,
        latest: Option<&Document>,
    ) -> Result<Projection, ExecutionError> {
        let fields = include | FieldSet::ALWAYS;

        let mut projection = match serde_json::to_value(doc) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(ExecutionError::Corrupt(format!("{} is not an object", doc.paper_id_v))),
            Err(e) => return Err(ExecutionError::Corrupt(format!("{}: {}", doc.paper_id_v, e))),
        };
        projection.retain(|name, _| fields.contains_name(name));

        if fields.contains(FieldSet::CANONICAL) {
            projection.insert("canonical".into(), Value::String(self.canonical(&doc.paper_id_v)));
        }
        if fields.contains(FieldSet::HREF) {
            projection.insert("href".into(), Value::String(self.href(&doc.paper_id_v)));
        }
        if let (true, Some(latest)) = (fields.contains(FieldSet::LATEST), latest) {
            projection.insert("latest".into(), Value::Object(self.project_minimal(latest)));
        }

        Ok(projection)
    }

    /// Every field, used for single-document lookups
    pub fn project_full(&self, doc: &Document, latest: Option<&Document>) -> Result<Projection, ExecutionError> {
        self.project(doc, FieldSet::all(), latest)
    }

    /// `paper_id`, `version`, `canonical` and `href` only
    pub fn project_minimal(&self, doc: &Document) -> Projection {
        let mut projection = Projection::new();
        projection.insert("paper_id".into(), Value::String(doc.paper_id.clone()));
        projection.insert("version".into(), Value::from(doc.version));
        projection.insert("canonical".into(), Value::String(self.canonical(&doc.paper_id_v)));
        projection.insert("href".into(), Value::String(self.href(&doc.paper_id_v)));
        projection
    }
}
