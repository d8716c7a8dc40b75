//! Elasticsearch document store.
//!
//! Plans are translated into the Elasticsearch query DSL and sent to
//! `<url>/<index>/_search`. Documents are expected to be indexed with the
//! same JSON shape as [`Document`]; classification fields are mapped as
//! `nested` objects.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::{unique_ids, DocumentStore, SearchHits, StoreError};
use crate::config::StoreConfig;
use crate::models::{DateType, Document};
use crate::plan::{
    ClassificationLevel, ClassificationScope, DateBounds, KeywordField, Pattern, Plan, PlanNode,
    Predicate, TextField, TextMatch,
};

/// Document store backed by an Elasticsearch index
#[derive(Debug, Clone)]
pub struct ElasticsearchStore {
    client: Arc<Client>,
    base: Url,
    index: String,
    credentials: Option<(String, Option<String>)>,
}

impl ElasticsearchStore {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let base = Url::parse(&config.url)
            .map_err(|e| StoreError::Unavailable(format!("invalid store url '{}': {}", config.url, e)))?;
        if base.cannot_be_a_base() {
            return Err(StoreError::Unavailable(format!("invalid store url '{}'", config.url)));
        }

        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            base,
            index: config.index.clone(),
            credentials: config.user.clone().map(|user| (user, config.password.clone())),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Unavailable(format!("invalid store url '{}'", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, password.as_ref()),
            None => builder,
        }
    }

    async fn post_search(&self, body: &Value) -> Result<EsSearchResponse, StoreError> {
        let url = self.endpoint(&[self.index.as_str(), "_search"])?;
        tracing::debug!(url = %url, "querying elasticsearch");

        let response = self.authorize(self.client.post(url)).json(body).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

#[derive(Debug, Deserialize)]
struct EsSearchResponse {
    hits: EsHits,
}

#[derive(Debug, Deserialize)]
struct EsHits {
    total: EsTotal,
    #[serde(default)]
    hits: Vec<EsHit>,
}

/// `hits.total` is an object since Elasticsearch 7 and a bare number before
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EsTotal {
    Count(usize),
    Object { value: usize },
}

impl EsTotal {
    fn value(&self) -> usize {
        match self {
            EsTotal::Count(n) | EsTotal::Object { value: n } => *n,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EsHit {
    #[serde(rename = "_source")]
    source: Document,
}

#[derive(Debug, Deserialize)]
struct EsGetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<Document>,
}

#[derive(Debug, Deserialize)]
struct EsHealth {
    status: String,
}

async fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::BAD_REQUEST {
        Err(StoreError::InvalidQuery(error_reason(&body)))
    } else {
        Err(StoreError::Unavailable(format!("elasticsearch returned {}: {}", status, error_reason(&body))))
    }
}

/// Pull the most specific reason out of an Elasticsearch error body
fn error_reason(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            v.pointer("/error/root_cause/0/reason")
                .or_else(|| v.pointer("/error/reason"))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
        .unwrap_or_else(|| body.chars().take(200).collect())
}

fn text_fields(field: TextField) -> &'static [&'static str] {
    match field {
        TextField::All => &[
            "title",
            "abstract",
            "authors_freeform",
            "comments",
            "journal_ref",
            "report_num",
            "acm_class",
            "msc_class",
            "doi",
            "paper_id",
        ],
        TextField::Author => &["authors_freeform", "authors.full_name"],
        TextField::Title => &["title"],
        TextField::Abstract => &["abstract"],
        TextField::Comments => &["comments"],
        TextField::JournalRef => &["journal_ref"],
        TextField::ReportNum => &["report_num"],
    }
}

fn keyword_fields(field: KeywordField) -> &'static [&'static str] {
    match field {
        KeywordField::AcmClass => &["acm_class"],
        KeywordField::MscClass => &["msc_class"],
        KeywordField::Doi => &["doi"],
        KeywordField::PaperId => &["paper_id", "paper_id_v"],
        KeywordField::Orcid => &["authors.orcid"],
        KeywordField::AuthorId => &["authors.author_id"],
        KeywordField::License => &["license.uri"],
    }
}

fn date_field(field: DateType) -> &'static str {
    field.as_str()
}

fn any_of(mut clauses: Vec<Value>) -> Value {
    if clauses.len() == 1 {
        return clauses.remove(0);
    }
    json!({ "bool": { "should": clauses, "minimum_should_match": 1 } })
}

fn pattern_clause(field: &str, pattern: &Pattern) -> Value {
    match pattern.as_literal() {
        Some(value) => json!({ "term": { field: { "value": value, "case_insensitive": true } } }),
        None => json!({
            "wildcard": { field: { "value": pattern.to_wildcard(), "case_insensitive": true } }
        }),
    }
}

fn text_clause(field: TextField, term: &TextMatch) -> Value {
    let fields = text_fields(field);
    match term {
        TextMatch::Token(pattern) => match pattern.as_literal() {
            Some(token) => json!({ "multi_match": { "query": token, "fields": fields, "operator": "and" } }),
            None => any_of(
                fields
                    .iter()
                    .map(|f| json!({ "wildcard": { *f: { "value": pattern.to_wildcard(), "case_insensitive": true } } }))
                    .collect(),
            ),
        },
        TextMatch::Phrase(tokens) => json!({
            "multi_match": { "query": tokens.join(" "), "fields": fields, "type": "phrase" }
        }),
    }
}

fn classification_clause(scope: ClassificationScope, level: ClassificationLevel, id: &str) -> Value {
    let path = match scope {
        ClassificationScope::Primary => "primary_classification",
        ClassificationScope::Secondary => "secondary_classification",
    };
    let term = |level: &str| {
        json!({ "term": { format!("{}.{}.id", path, level): { "value": id, "case_insensitive": true } } })
    };
    let query = match level {
        ClassificationLevel::Group => term("group"),
        ClassificationLevel::Category => term("category"),
        ClassificationLevel::ArchiveOrCategory => any_of(vec![term("archive"), term("category")]),
    };
    json!({ "nested": { "path": path, "query": query } })
}

fn range_clause(field: DateType, bounds: &DateBounds) -> Value {
    let mut range = serde_json::Map::new();
    match bounds {
        DateBounds::Day { gte, lte } => {
            if let Some(gte) = gte {
                range.insert("gte".into(), json!(gte.format("%Y-%m-%d").to_string()));
            }
            if let Some(lte) = lte {
                range.insert("lte".into(), json!(format!("{}||/d", lte.format("%Y-%m-%d"))));
            }
            range.insert("format".into(), json!("yyyy-MM-dd"));
            range.insert("time_zone".into(), json!("UTC"));
        }
        DateBounds::Month { gte, lte } => {
            if let Some(gte) = gte {
                range.insert("gte".into(), json!(gte.to_string()));
            }
            if let Some(lte) = lte {
                range.insert("lte".into(), json!(lte.to_string()));
            }
            range.insert("format".into(), json!("yyyy-MM"));
        }
    }
    json!({ "range": { date_field(field): range } })
}

/// Translate a plan node into an Elasticsearch query clause
pub(crate) fn translate(node: &PlanNode) -> Value {
    match node {
        PlanNode::MatchAll => json!({ "match_all": {} }),
        PlanNode::And(nodes) => json!({ "bool": { "must": nodes.iter().map(translate).collect::<Vec<_>>() } }),
        PlanNode::Or(nodes) => json!({
            "bool": { "should": nodes.iter().map(translate).collect::<Vec<_>>(), "minimum_should_match": 1 }
        }),
        PlanNode::Predicate(Predicate::Text { field, terms }) => {
            let clauses: Vec<Value> = terms.iter().map(|t| text_clause(*field, t)).collect();
            if clauses.len() == 1 {
                clauses.into_iter().next().unwrap_or_else(|| json!({ "match_all": {} }))
            } else {
                json!({ "bool": { "must": clauses } })
            }
        }
        PlanNode::Predicate(Predicate::Keyword { field, pattern }) => any_of(
            keyword_fields(*field)
                .iter()
                .map(|f| pattern_clause(f, pattern))
                .collect(),
        ),
        PlanNode::Predicate(Predicate::Classification { scope, level, id }) => {
            classification_clause(*scope, *level, id)
        }
        PlanNode::Predicate(Predicate::DateRange { field, bounds }) => range_clause(*field, bounds),
    }
}

/// Full `_search` request body for one result window
pub(crate) fn search_body(plan: &Plan, start: usize, size: usize) -> Value {
    let direction = if plan.order.is_descending() { "desc" } else { "asc" };
    json!({
        "query": translate(&plan.root),
        "from": start,
        "size": size,
        "sort": [
            { "submitted_date": { "order": direction } },
            { "paper_id_v": { "order": direction } }
        ],
        "track_total_hits": true
    })
}

/// One hit per paper: the current version, else the highest
pub(crate) fn latest_body(paper_ids: &[&str]) -> Value {
    json!({
        "query": { "terms": { "paper_id": paper_ids } },
        "collapse": { "field": "paper_id" },
        "sort": [
            { "is_current": { "order": "desc" } },
            { "version": { "order": "desc" } }
        ],
        "size": paper_ids.len()
    })
}

#[async_trait]
impl DocumentStore for ElasticsearchStore {
    fn id(&self) -> &str {
        "elasticsearch"
    }

    async fn search(&self, plan: &Plan, start: usize, size: usize) -> Result<SearchHits, StoreError> {
        let response = self.post_search(&search_body(plan, start, size)).await?;
        Ok(SearchHits {
            total: response.hits.total.value(),
            documents: response.hits.hits.into_iter().map(|h| h.source).collect(),
        })
    }

    async fn get_version(&self, paper_id: &str, version: u32) -> Result<Option<Document>, StoreError> {
        let id = crate::models::versioned_id(paper_id, version);
        let url = self.endpoint(&[self.index.as_str(), "_doc", id.as_str()])?;

        let response = self.authorize(self.client.get(url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: EsGetResponse = check_status(response).await?.json().await?;
        Ok(if body.found { body.source } else { None })
    }

    async fn get_latest(&self, paper_id: &str) -> Result<Option<Document>, StoreError> {
        let body = json!({
            "query": { "term": { "paper_id": { "value": paper_id } } },
            "sort": [
                { "is_current": { "order": "desc" } },
                { "version": { "order": "desc" } }
            ],
            "size": 1
        });
        let response = self.post_search(&body).await?;
        Ok(response.hits.hits.into_iter().next().map(|h| h.source))
    }

    async fn latest_versions(&self, paper_ids: &[String]) -> Result<HashMap<String, Document>, StoreError> {
        let ids = unique_ids(paper_ids);
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let response = self.post_search(&latest_body(&ids)).await?;
        Ok(response
            .hits
            .hits
            .into_iter()
            .map(|h| (h.source.paper_id.clone(), h.source))
            .collect())
    }

    async fn health(&self) -> Result<(), StoreError> {
        let mut url = self.endpoint(&["_cluster", "health"])?;
        url.set_query(Some("wait_for_status=yellow&timeout=1s"));

        let response = self.authorize(self.client.get(url)).send().await?;
        let health: EsHealth = check_status(response).await?.json().await?;
        if health.status == "red" {
            return Err(StoreError::Unavailable("cluster status is red".to_string()));
        }
        Ok(())
    }
}
