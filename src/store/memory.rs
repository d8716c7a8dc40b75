//! In-memory document store.
//!
//! Holds an immutable, pre-sorted snapshot of documents. Each plan is turned
//! into a [`Matcher`] once (wildcards become anchored regexes) and evaluated
//! against the snapshot. The snapshot is shared behind an `Arc` and never
//! mutated, so a query always sees one consistent document set.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use super::{default_order, unique_ids, DocumentStore, SearchHits, StoreError};
use crate::models::text::tokenize;
use crate::models::{Classification, DateType, Document, YearMonth};
use crate::plan::{
    ClassificationLevel, ClassificationScope, DateBounds, KeywordField, Pattern, Plan, PlanNode,
    Predicate, TextField, TextMatch,
};

/// A document with its text fields pre-tokenized
#[derive(Debug)]
struct IndexedDocument {
    document: Document,
    title: Vec<String>,
    abstract_text: Vec<String>,
    authors: Vec<Vec<String>>,
    comments: Vec<String>,
    journal_ref: Vec<String>,
    report_num: Vec<String>,
    identifiers: Vec<Vec<String>>,
}

impl IndexedDocument {
    fn new(document: Document) -> Self {
        let opt = |s: &Option<String>| s.as_deref().map(tokenize).unwrap_or_default();

        let mut authors: Vec<Vec<String>> =
            document.authors.iter().map(|p| tokenize(&p.full_name)).collect();
        authors.push(tokenize(&document.authors_freeform));

        let identifiers = document
            .acm_class
            .iter()
            .chain(&document.msc_class)
            .chain(&document.doi)
            .chain(std::iter::once(&document.paper_id))
            .map(|s| tokenize(s))
            .collect();

        Self {
            title: tokenize(&document.title),
            abstract_text: tokenize(&document.r#abstract),
            comments: opt(&document.comments),
            journal_ref: opt(&document.journal_ref),
            report_num: opt(&document.report_num),
            authors,
            identifiers,
            document,
        }
    }

    /// Token sequences searched for a text field; phrases never span two sequences
    fn sequences(&self, field: TextField) -> Vec<&[String]> {
        match field {
            TextField::Title => vec![self.title.as_slice()],
            TextField::Abstract => vec![self.abstract_text.as_slice()],
            TextField::Comments => vec![self.comments.as_slice()],
            TextField::JournalRef => vec![self.journal_ref.as_slice()],
            TextField::ReportNum => vec![self.report_num.as_slice()],
            TextField::Author => self.authors.iter().map(Vec::as_slice).collect(),
            TextField::All => {
                let mut all = vec![
                    self.title.as_slice(),
                    self.abstract_text.as_slice(),
                    self.comments.as_slice(),
                    self.journal_ref.as_slice(),
                    self.report_num.as_slice(),
                ];
                all.extend(self.authors.iter().map(Vec::as_slice));
                all.extend(self.identifiers.iter().map(Vec::as_slice));
                all
            }
        }
    }

    fn keyword_values(&self, field: KeywordField) -> Vec<&str> {
        let doc = &self.document;
        match field {
            KeywordField::AcmClass => doc.acm_class.iter().map(String::as_str).collect(),
            KeywordField::MscClass => doc.msc_class.iter().map(String::as_str).collect(),
            KeywordField::Doi => doc.doi.iter().map(String::as_str).collect(),
            KeywordField::PaperId => vec![doc.paper_id.as_str(), doc.paper_id_v.as_str()],
            KeywordField::Orcid => doc.authors.iter().filter_map(|p| p.orcid.as_deref()).collect(),
            KeywordField::AuthorId => doc.authors.iter().filter_map(|p| p.author_id.as_deref()).collect(),
            KeywordField::License => doc.license.iter().map(|l| l.uri.as_str()).collect(),
        }
    }
}

#[derive(Debug)]
enum TokenMatcher {
    Exact(String),
    Pattern(Regex),
}

impl TokenMatcher {
    fn is_match(&self, token: &str) -> bool {
        match self {
            TokenMatcher::Exact(s) => s == token,
            TokenMatcher::Pattern(re) => re.is_match(token),
        }
    }
}

#[derive(Debug)]
enum TermMatcher {
    Token(TokenMatcher),
    Phrase(Vec<String>),
}

impl TermMatcher {
    fn is_match(&self, sequence: &[String]) -> bool {
        match self {
            TermMatcher::Token(m) => sequence.iter().any(|t| m.is_match(t)),
            TermMatcher::Phrase(phrase) => {
                !phrase.is_empty() && sequence.windows(phrase.len()).any(|w| w == phrase.as_slice())
            }
        }
    }
}

/// A plan prepared for evaluation against indexed documents
#[derive(Debug)]
enum Matcher {
    All,
    And(Vec<Matcher>),
    Or(Vec<Matcher>),
    Text {
        field: TextField,
        terms: Vec<TermMatcher>,
    },
    Keyword {
        field: KeywordField,
        regex: Regex,
    },
    Classification {
        scope: ClassificationScope,
        level: ClassificationLevel,
        id: String,
    },
    Date {
        field: DateType,
        bounds: DateBounds,
    },
}

impl Matcher {
    fn from_plan(plan: &Plan) -> Result<Self, StoreError> {
        Self::from_node(&plan.root)
    }

    fn from_node(node: &PlanNode) -> Result<Self, StoreError> {
        Ok(match node {
            PlanNode::MatchAll => Matcher::All,
            PlanNode::And(nodes) => Matcher::And(nodes.iter().map(Self::from_node).collect::<Result<_, _>>()?),
            PlanNode::Or(nodes) => Matcher::Or(nodes.iter().map(Self::from_node).collect::<Result<_, _>>()?),
            PlanNode::Predicate(Predicate::Text { field, terms }) => Matcher::Text {
                field: *field,
                terms: terms.iter().map(term_matcher).collect::<Result<_, _>>()?,
            },
            PlanNode::Predicate(Predicate::Keyword { field, pattern }) => Matcher::Keyword {
                field: *field,
                regex: compile_regex(pattern)?,
            },
            PlanNode::Predicate(Predicate::Classification { scope, level, id }) => Matcher::Classification {
                scope: *scope,
                level: *level,
                id: id.clone(),
            },
            PlanNode::Predicate(Predicate::DateRange { field, bounds }) => Matcher::Date {
                field: *field,
                bounds: *bounds,
            },
        })
    }

    fn is_match(&self, doc: &IndexedDocument) -> bool {
        match self {
            Matcher::All => true,
            Matcher::And(ms) => ms.iter().all(|m| m.is_match(doc)),
            Matcher::Or(ms) => ms.iter().any(|m| m.is_match(doc)),
            Matcher::Text { field, terms } => {
                let sequences = doc.sequences(*field);
                terms
                    .iter()
                    .all(|term| sequences.iter().any(|seq| term.is_match(seq)))
            }
            Matcher::Keyword { field, regex } => doc
                .keyword_values(*field)
                .into_iter()
                .any(|v| regex.is_match(v)),
            Matcher::Classification { scope, level, id } => {
                let d = &doc.document;
                let mut candidates: Box<dyn Iterator<Item = &Classification>> = match scope {
                    ClassificationScope::Primary => Box::new(std::iter::once(&d.primary_classification)),
                    ClassificationScope::Secondary => Box::new(d.secondary_classification.iter()),
                };
                candidates.any(|c| classification_matches(c, *level, id))
            }
            Matcher::Date { field, bounds } => date_matches(&doc.document, *field, bounds),
        }
    }
}

fn term_matcher(term: &TextMatch) -> Result<TermMatcher, StoreError> {
    Ok(match term {
        TextMatch::Token(pattern) => match pattern.as_literal() {
            Some(lit) => TermMatcher::Token(TokenMatcher::Exact(lit.to_lowercase())),
            None => TermMatcher::Token(TokenMatcher::Pattern(compile_regex(pattern)?)),
        },
        TextMatch::Phrase(tokens) => TermMatcher::Phrase(tokens.iter().map(|t| t.to_lowercase()).collect()),
    })
}

fn compile_regex(pattern: &Pattern) -> Result<Regex, StoreError> {
    Regex::new(&pattern.to_regex()).map_err(|e| StoreError::InvalidQuery(format!("pattern too complex: {}", e)))
}

fn classification_matches(c: &Classification, level: ClassificationLevel, id: &str) -> bool {
    match level {
        ClassificationLevel::Group => c.group.id.eq_ignore_ascii_case(id),
        ClassificationLevel::Category => c.category.id.eq_ignore_ascii_case(id),
        ClassificationLevel::ArchiveOrCategory => {
            c.archive.id.eq_ignore_ascii_case(id) || c.category.id.eq_ignore_ascii_case(id)
        }
    }
}

/// Day bounds are UTC calendar days
fn date_matches(doc: &Document, field: DateType, bounds: &DateBounds) -> bool {
    let day: Option<NaiveDate> = match field {
        DateType::SubmittedDate => Some(doc.submitted_date.with_timezone(&Utc).date_naive()),
        DateType::SubmittedDateFirst => Some(doc.submitted_date_first.with_timezone(&Utc).date_naive()),
        DateType::AnnouncedDateFirst => None,
    };

    match (bounds, day) {
        (DateBounds::Day { gte, lte }, Some(d)) => within(d, *gte, *lte),
        (DateBounds::Month { gte, lte }, Some(d)) => within(YearMonth::from_date(d), *gte, *lte),
        (DateBounds::Month { gte, lte }, None) => doc
            .announced_date_first
            .is_some_and(|ym| within(ym, *gte, *lte)),
        (DateBounds::Day { gte, lte }, None) => doc.announced_date_first.is_some_and(|ym| {
            within(ym, gte.map(YearMonth::from_date), lte.map(YearMonth::from_date))
        }),
    }
}

fn within<T: PartialOrd>(value: T, gte: Option<T>, lte: Option<T>) -> bool {
    gte.map_or(true, |g| value >= g) && lte.map_or(true, |l| value <= l)
}

#[derive(Debug)]
struct Snapshot {
    /// Sorted in default order
    documents: Vec<IndexedDocument>,
    /// paper_id → indices into `documents`
    by_paper: HashMap<String, Vec<usize>>,
}

/// Document store backed by an immutable in-memory snapshot
#[derive(Debug, Clone)]
pub struct MemoryStore {
    snapshot: Arc<Snapshot>,
}

impl MemoryStore {
    /// Build a store, rejecting datasets that break identifier invariants
    pub fn new(mut documents: Vec<Document>) -> Result<Self, StoreError> {
        let mut seen = HashSet::new();
        let mut current = HashSet::new();
        for doc in &documents {
            if !doc.has_consistent_id() {
                return Err(StoreError::Corrupt(format!(
                    "{} does not match paper_id {} version {}",
                    doc.paper_id_v, doc.paper_id, doc.version
                )));
            }
            if !seen.insert(doc.paper_id_v.clone()) {
                return Err(StoreError::Corrupt(format!("duplicate document {}", doc.paper_id_v)));
            }
            if doc.is_current && !current.insert(doc.paper_id.clone()) {
                return Err(StoreError::Corrupt(format!(
                    "more than one current version of {}",
                    doc.paper_id
                )));
            }
        }

        documents.sort_by(default_order);

        let mut by_paper: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, doc) in documents.iter().enumerate() {
            by_paper.entry(doc.paper_id.clone()).or_default().push(i);
        }

        let documents = documents.into_iter().map(IndexedDocument::new).collect();
        tracing::debug!(papers = by_paper.len(), "built in-memory snapshot");

        Ok(Self {
            snapshot: Arc::new(Snapshot { documents, by_paper }),
        })
    }

    /// Load documents from a JSON array or JSON-lines file
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path)?;
        let documents = parse_documents(&content)?;
        tracing::info!("Loaded {} documents from {}", documents.len(), path.display());
        Self::new(documents)
    }

    pub fn len(&self) -> usize {
        self.snapshot.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.documents.is_empty()
    }

    fn versions(&self, paper_id: &str) -> impl Iterator<Item = &Document> {
        self.snapshot
            .by_paper
            .get(paper_id)
            .into_iter()
            .flatten()
            .map(|&i| &self.snapshot.documents[i].document)
    }

    /// The current version, else the highest one
    fn latest(&self, paper_id: &str) -> Option<&Document> {
        self.versions(paper_id)
            .find(|d| d.is_current)
            .or_else(|| self.versions(paper_id).max_by_key(|d| d.version))
    }
}

/// Count every match and keep those inside `[start, start + size)`
fn window<'a>(
    documents: impl Iterator<Item = &'a IndexedDocument>,
    matcher: &Matcher,
    start: usize,
    size: usize,
) -> SearchHits {
    let mut total = 0;
    let mut page = Vec::new();
    for doc in documents.filter(|d| matcher.is_match(d)) {
        if total >= start && page.len() < size {
            page.push(doc.document.clone());
        }
        total += 1;
    }
    SearchHits {
        documents: page,
        total,
    }
}

fn parse_documents(content: &str) -> Result<Vec<Document>, StoreError> {
    if content.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(content)?);
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .map_err(|e| StoreError::Corrupt(format!("line {}: {}", n + 1, e)))
        })
        .collect()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn id(&self) -> &str {
        "memory"
    }

    async fn search(&self, plan: &Plan, start: usize, size: usize) -> Result<SearchHits, StoreError> {
        let matcher = Matcher::from_plan(plan)?;
        let snapshot = Arc::clone(&self.snapshot);

        // The snapshot is kept newest first; ascending order is its exact reverse
        let hits = if plan.order.is_descending() {
            window(snapshot.documents.iter(), &matcher, start, size)
        } else {
            window(snapshot.documents.iter().rev(), &matcher, start, size)
        };
        Ok(hits)
    }

    async fn get_version(&self, paper_id: &str, version: u32) -> Result<Option<Document>, StoreError> {
        Ok(self.versions(paper_id).find(|d| d.version == version).cloned())
    }

    async fn get_latest(&self, paper_id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.latest(paper_id).cloned())
    }

    async fn latest_versions(&self, paper_ids: &[String]) -> Result<HashMap<String, Document>, StoreError> {
        Ok(unique_ids(paper_ids)
            .into_iter()
            .filter_map(|id| self.latest(id))
            .map(|doc| (doc.paper_id.clone(), doc.clone()))
            .collect())
    }
}
