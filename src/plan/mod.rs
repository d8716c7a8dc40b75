//! Filter compiler: turns a [`Query`] into a predicate tree.
//!
//! Every provided parameter contributes exactly one node. Nodes are combined
//! with AND; classification parameters first OR their own values together.
//! The resulting [`Plan`] is store-neutral and each
//! [`DocumentStore`](crate::store::DocumentStore) evaluates or translates it.
//!
//! ```rust
//! use paper_search::models::{Query, QueryLimits};
//! use paper_search::plan::{compile, FilterCapabilities, PlanNode};
//!
//! let limits = QueryLimits::default();
//! let query = Query::from_pairs([("title", "muon"), ("primary_classification", "hep-ex")], &limits).unwrap();
//! let plan = compile(&query, FilterCapabilities::all()).unwrap();
//! assert!(matches!(plan.root, PlanNode::And(_)));
//! ```

mod pattern;

pub use pattern::{Pattern, Segment};

use chrono::NaiveDate;

use crate::models::{
    ClassificationToken, DateType, KeywordQuery, Parameter, Query, SortOrder, TextQuery, TextTerm,
    YearMonth,
};

bitflags::bitflags! {
    /// Filter fields a store is able to evaluate
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FilterCapabilities: u32 {
        const ALL_TEXT = 1 << 0;
        const AUTHOR = 1 << 1;
        const TITLE = 1 << 2;
        const ABSTRACT = 1 << 3;
        const COMMENTS = 1 << 4;
        const JOURNAL_REF = 1 << 5;
        const REPORT_NUM = 1 << 6;
        const ACM_CLASS = 1 << 7;
        const MSC_CLASS = 1 << 8;
        const DOI = 1 << 9;
        const PAPER_ID = 1 << 10;
        const ORCID = 1 << 11;
        const AUTHOR_ID = 1 << 12;
        const LICENSE = 1 << 13;
        const PRIMARY_CLASSIFICATION = 1 << 14;
        const SECONDARY_CLASSIFICATION = 1 << 15;
        const SUBMITTED_DATE = 1 << 16;
        const SUBMITTED_DATE_FIRST = 1 << 17;
        const ANNOUNCED_DATE_FIRST = 1 << 18;
    }
}

/// Fields searched by free-text predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    /// Every text and keyword field of the document
    All,
    Author,
    Title,
    Abstract,
    Comments,
    JournalRef,
    ReportNum,
}

impl TextField {
    fn capability(&self) -> FilterCapabilities {
        match self {
            TextField::All => FilterCapabilities::ALL_TEXT,
            TextField::Author => FilterCapabilities::AUTHOR,
            TextField::Title => FilterCapabilities::TITLE,
            TextField::Abstract => FilterCapabilities::ABSTRACT,
            TextField::Comments => FilterCapabilities::COMMENTS,
            TextField::JournalRef => FilterCapabilities::JOURNAL_REF,
            TextField::ReportNum => FilterCapabilities::REPORT_NUM,
        }
    }
}

/// Fields matched as whole-value keyword patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordField {
    AcmClass,
    MscClass,
    Doi,
    /// Matches `paper_id` or `paper_id_v`
    PaperId,
    Orcid,
    AuthorId,
    /// License URI
    License,
}

impl KeywordField {
    fn capability(&self) -> FilterCapabilities {
        match self {
            KeywordField::AcmClass => FilterCapabilities::ACM_CLASS,
            KeywordField::MscClass => FilterCapabilities::MSC_CLASS,
            KeywordField::Doi => FilterCapabilities::DOI,
            KeywordField::PaperId => FilterCapabilities::PAPER_ID,
            KeywordField::Orcid => FilterCapabilities::ORCID,
            KeywordField::AuthorId => FilterCapabilities::AUTHOR_ID,
            KeywordField::License => FilterCapabilities::LICENSE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationScope {
    Primary,
    Secondary,
}

/// Taxonomy level a classification predicate tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationLevel {
    Group,
    Category,
    /// An archive id, or a category whose id equals it (e.g. `hep-th`)
    ArchiveOrCategory,
}

/// One term of a compiled text predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMatch {
    /// A single token pattern
    Token(Pattern),
    /// Consecutive literal tokens
    Phrase(Vec<String>),
}

/// Closed date range on one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBounds {
    Day {
        gte: Option<NaiveDate>,
        lte: Option<NaiveDate>,
    },
    Month {
        gte: Option<YearMonth>,
        lte: Option<YearMonth>,
    },
}

/// Leaf predicate of a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Every term must match somewhere in the field
    Text {
        field: TextField,
        terms: Vec<TextMatch>,
    },
    Keyword {
        field: KeywordField,
        pattern: Pattern,
    },
    Classification {
        scope: ClassificationScope,
        level: ClassificationLevel,
        id: String,
    },
    DateRange {
        field: DateType,
        bounds: DateBounds,
    },
}

/// Plan tree node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanNode {
    MatchAll,
    And(Vec<PlanNode>),
    Or(Vec<PlanNode>),
    Predicate(Predicate),
}

/// A compiled query plan: the predicate tree and the result order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub root: PlanNode,
    pub order: SortOrder,
}

impl Plan {
    pub fn match_all() -> Self {
        Self {
            root: PlanNode::MatchAll,
            order: SortOrder::default(),
        }
    }

    /// Number of leaf predicates in the tree
    pub fn predicate_count(&self) -> usize {
        fn count(node: &PlanNode) -> usize {
            match node {
                PlanNode::MatchAll => 0,
                PlanNode::Predicate(_) => 1,
                PlanNode::And(nodes) | PlanNode::Or(nodes) => nodes.iter().map(count).sum(),
            }
        }
        count(&self.root)
    }
}

/// Errors raised while compiling a query
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("Filter on '{parameter}' is not supported by the document store")]
    UnsupportedFilter { parameter: String },

    #[error("Date filter on '{date_type}' is not supported by the document store")]
    UnsupportedDateField { date_type: String },
}

impl CompileError {
    pub fn parameter(&self) -> &str {
        match self {
            CompileError::UnsupportedFilter { parameter } => parameter,
            CompileError::UnsupportedDateField { .. } => "date_type",
        }
    }
}

/// Compile a query into a plan the store can evaluate
pub fn compile(query: &Query, capabilities: FilterCapabilities) -> Result<Plan, CompileError> {
    let require = |param: Parameter, cap: FilterCapabilities| {
        if capabilities.contains(cap) {
            Ok(())
        } else {
            Err(CompileError::UnsupportedFilter {
                parameter: param.name().to_string(),
            })
        }
    };

    let mut nodes = Vec::new();

    let texts = [
        (Parameter::All, TextField::All, &query.all),
        (Parameter::Author, TextField::Author, &query.author),
        (Parameter::Title, TextField::Title, &query.title),
        (Parameter::Abstract, TextField::Abstract, &query.abstract_text),
        (Parameter::Comments, TextField::Comments, &query.comments),
        (Parameter::JournalRef, TextField::JournalRef, &query.journal_ref),
        (Parameter::ReportNum, TextField::ReportNum, &query.report_num),
    ];
    for (param, field, text) in texts {
        if let Some(text) = text {
            require(param, field.capability())?;
            nodes.push(text_node(field, text));
        }
    }

    let keywords = [
        (Parameter::AcmClass, KeywordField::AcmClass, &query.acm_class),
        (Parameter::MscClass, KeywordField::MscClass, &query.msc_class),
        (Parameter::Doi, KeywordField::Doi, &query.doi),
        (Parameter::PaperId, KeywordField::PaperId, &query.paper_id),
        (Parameter::Orcid, KeywordField::Orcid, &query.orcid),
        (Parameter::AuthorId, KeywordField::AuthorId, &query.author_id),
        (Parameter::License, KeywordField::License, &query.license),
    ];
    for (param, field, keyword) in keywords {
        if let Some(keyword) = keyword {
            require(param, field.capability())?;
            nodes.push(keyword_node(field, keyword));
        }
    }

    let classifications = [
        (
            Parameter::PrimaryClassification,
            ClassificationScope::Primary,
            FilterCapabilities::PRIMARY_CLASSIFICATION,
            &query.primary_classification,
        ),
        (
            Parameter::SecondaryClassification,
            ClassificationScope::Secondary,
            FilterCapabilities::SECONDARY_CLASSIFICATION,
            &query.secondary_classification,
        ),
    ];
    for (param, scope, cap, tokens) in classifications {
        if !tokens.is_empty() {
            require(param, cap)?;
            nodes.push(classification_node(scope, tokens));
        }
    }

    if query.start_date.is_some() || query.end_date.is_some() {
        let cap = match query.date_type {
            DateType::SubmittedDate => FilterCapabilities::SUBMITTED_DATE,
            DateType::SubmittedDateFirst => FilterCapabilities::SUBMITTED_DATE_FIRST,
            DateType::AnnouncedDateFirst => FilterCapabilities::ANNOUNCED_DATE_FIRST,
        };
        if !capabilities.contains(cap) {
            return Err(CompileError::UnsupportedDateField {
                date_type: query.date_type.as_str().to_string(),
            });
        }
        nodes.push(PlanNode::Predicate(Predicate::DateRange {
            field: query.date_type,
            bounds: date_bounds(query),
        }));
    }

    let root = match nodes.len() {
        0 => PlanNode::MatchAll,
        1 => nodes.remove(0),
        _ => PlanNode::And(nodes),
    };
    let plan = Plan {
        root,
        order: query.order,
    };
    tracing::debug!(
        predicates = plan.predicate_count(),
        order = plan.order.as_str(),
        "compiled query plan"
    );
    Ok(plan)
}

fn text_node(field: TextField, text: &TextQuery) -> PlanNode {
    let terms = text
        .terms
        .iter()
        .map(|term| match term {
            TextTerm::Term(t) => TextMatch::Token(Pattern::parse(t)),
            TextTerm::Phrase(tokens) => TextMatch::Phrase(tokens.clone()),
        })
        .collect();
    PlanNode::Predicate(Predicate::Text { field, terms })
}

fn keyword_node(field: KeywordField, keyword: &KeywordQuery) -> PlanNode {
    PlanNode::Predicate(Predicate::Keyword {
        field,
        pattern: Pattern::parse(&keyword.raw),
    })
}

fn classification_node(scope: ClassificationScope, tokens: &[ClassificationToken]) -> PlanNode {
    let mut alternatives: Vec<PlanNode> = tokens
        .iter()
        .map(|token| {
            let level = match token {
                ClassificationToken::Group(_) => ClassificationLevel::Group,
                ClassificationToken::Category(_) => ClassificationLevel::Category,
                ClassificationToken::Archive(_) => ClassificationLevel::ArchiveOrCategory,
            };
            PlanNode::Predicate(Predicate::Classification {
                scope,
                level,
                id: token.as_str().to_string(),
            })
        })
        .collect();

    if alternatives.len() == 1 {
        alternatives.remove(0)
    } else {
        PlanNode::Or(alternatives)
    }
}

fn date_bounds(query: &Query) -> DateBounds {
    match query.date_type {
        DateType::AnnouncedDateFirst => DateBounds::Month {
            gte: query.start_date.map(YearMonth::from_date),
            lte: query.end_date.map(YearMonth::from_date),
        },
        _ => DateBounds::Day {
            gte: query.start_date,
            lte: query.end_date,
        },
    }
}
