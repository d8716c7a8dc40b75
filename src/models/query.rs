//! Search query model: one typed field per supported request parameter.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::document::Document;
use super::fields::FieldSet;
use super::text::{parse_text_terms, TextTerm};
use crate::utils::ValidationError;

/// Every request parameter the search endpoint recognizes, in the order
/// they are echoed back in response metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Parameter {
    All,
    Author,
    Title,
    Abstract,
    Comments,
    JournalRef,
    ReportNum,
    AcmClass,
    MscClass,
    Doi,
    PaperId,
    Orcid,
    AuthorId,
    License,
    PrimaryClassification,
    SecondaryClassification,
    StartDate,
    EndDate,
    DateType,
    Order,
    Include,
    Start,
    Size,
}

impl Parameter {
    pub const ALL: [Parameter; 23] = [
        Parameter::All,
        Parameter::Author,
        Parameter::Title,
        Parameter::Abstract,
        Parameter::Comments,
        Parameter::JournalRef,
        Parameter::ReportNum,
        Parameter::AcmClass,
        Parameter::MscClass,
        Parameter::Doi,
        Parameter::PaperId,
        Parameter::Orcid,
        Parameter::AuthorId,
        Parameter::License,
        Parameter::PrimaryClassification,
        Parameter::SecondaryClassification,
        Parameter::StartDate,
        Parameter::EndDate,
        Parameter::DateType,
        Parameter::Order,
        Parameter::Include,
        Parameter::Start,
        Parameter::Size,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Parameter::All => "all",
            Parameter::Author => "author",
            Parameter::Title => "title",
            Parameter::Abstract => "abstract",
            Parameter::Comments => "comments",
            Parameter::JournalRef => "journal_ref",
            Parameter::ReportNum => "report_num",
            Parameter::AcmClass => "acm_class",
            Parameter::MscClass => "msc_class",
            Parameter::Doi => "doi",
            Parameter::PaperId => "paper_id",
            Parameter::Orcid => "orcid",
            Parameter::AuthorId => "author_id",
            Parameter::License => "license",
            Parameter::PrimaryClassification => "primary_classification",
            Parameter::SecondaryClassification => "secondary_classification",
            Parameter::StartDate => "start_date",
            Parameter::EndDate => "end_date",
            Parameter::DateType => "date_type",
            Parameter::Order => "order",
            Parameter::Include => "include",
            Parameter::Start => "start",
            Parameter::Size => "size",
        }
    }

    /// Resolve a query-string key; a trailing `[]` is accepted
    pub fn from_key(key: &str) -> Option<Parameter> {
        let key = key.strip_suffix("[]").unwrap_or(key);
        Self::ALL.iter().copied().find(|p| p.name() == key)
    }

    /// Whether the parameter may be repeated
    pub fn is_multi_valued(&self) -> bool {
        matches!(
            self,
            Parameter::PrimaryClassification | Parameter::SecondaryClassification | Parameter::Include
        )
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which date field a date range applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateType {
    SubmittedDateFirst,
    #[default]
    SubmittedDate,
    AnnouncedDateFirst,
}

impl DateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateType::SubmittedDateFirst => "submitted_date_first",
            DateType::SubmittedDate => "submitted_date",
            DateType::AnnouncedDateFirst => "announced_date_first",
        }
    }
}

impl FromStr for DateType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted_date_first" => Ok(DateType::SubmittedDateFirst),
            "submitted_date" => Ok(DateType::SubmittedDate),
            "announced_date_first" => Ok(DateType::AnnouncedDateFirst),
            other => Err(ValidationError::invalid(
                "date_type",
                other,
                "expected one of submitted_date_first, submitted_date, announced_date_first",
            )),
        }
    }
}

/// Result order on submission date. Ties break on `paper_id_v` in the
/// same direction, so the two orders are exact reverses of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// `-submitted_date`: most recent first
    #[default]
    SubmittedDateDesc,
    /// `submitted_date`: oldest first
    SubmittedDateAsc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::SubmittedDateDesc => "-submitted_date",
            SortOrder::SubmittedDateAsc => "submitted_date",
        }
    }

    pub fn is_descending(&self) -> bool {
        matches!(self, SortOrder::SubmittedDateDesc)
    }

    /// Compare two documents; `Less` sorts first
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let ascending = a
            .submitted_date
            .cmp(&b.submitted_date)
            .then_with(|| a.paper_id_v.cmp(&b.paper_id_v));
        match self {
            SortOrder::SubmittedDateAsc => ascending,
            SortOrder::SubmittedDateDesc => ascending.reverse(),
        }
    }
}

impl FromStr for SortOrder {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "-submitted_date" => Ok(SortOrder::SubmittedDateDesc),
            "submitted_date" => Ok(SortOrder::SubmittedDateAsc),
            other => Err(ValidationError::invalid(
                "order",
                other,
                "expected submitted_date or -submitted_date",
            )),
        }
    }
}

/// A parsed free-text parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextQuery {
    pub raw: String,
    pub terms: Vec<TextTerm>,
}

impl TextQuery {
    pub fn parse(parameter: Parameter, raw: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            raw: raw.to_string(),
            terms: parse_text_terms(parameter.name(), raw)?,
        })
    }
}

/// A whole-value keyword pattern; `*` and `?` are wildcards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordQuery {
    pub raw: String,
}

impl KeywordQuery {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }
}

/// A classification filter token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationToken {
    /// `grp_*` group identifier
    Group(String),
    /// Bare identifier matching either an archive or a category
    Archive(String),
    /// Dotted category identifier, e.g. `astro-ph.CO`
    Category(String),
}

impl ClassificationToken {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with("grp_") {
            ClassificationToken::Group(raw.to_string())
        } else if raw.contains('.') {
            ClassificationToken::Category(raw.to_string())
        } else {
            ClassificationToken::Archive(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ClassificationToken::Group(s)
            | ClassificationToken::Archive(s)
            | ClassificationToken::Category(s) => s,
        }
    }
}

/// Pagination and size limits applied while parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub default_size: usize,
    pub max_size: usize,
    /// Deepest result offset the store will serve
    pub max_results: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_size: 50,
            max_size: 2000,
            max_results: 10_000,
        }
    }
}

/// One applied parameter as echoed in response metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParameter {
    pub parameter: String,
    pub value: String,
}

/// A validated search request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub all: Option<TextQuery>,
    pub author: Option<TextQuery>,
    pub title: Option<TextQuery>,
    pub abstract_text: Option<TextQuery>,
    pub comments: Option<TextQuery>,
    pub journal_ref: Option<TextQuery>,
    pub report_num: Option<TextQuery>,

    pub acm_class: Option<KeywordQuery>,
    pub msc_class: Option<KeywordQuery>,
    pub doi: Option<KeywordQuery>,
    pub paper_id: Option<KeywordQuery>,
    pub orcid: Option<KeywordQuery>,
    pub author_id: Option<KeywordQuery>,
    pub license: Option<KeywordQuery>,

    pub primary_classification: Vec<ClassificationToken>,
    pub secondary_classification: Vec<ClassificationToken>,

    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub date_type: DateType,
    pub order: SortOrder,

    /// Fields requested via `include`, beyond the always-present ones
    pub include: FieldSet,

    pub start: usize,
    pub size: usize,
}

impl Query {
    /// An empty query matching everything, with default pagination
    pub fn new(limits: &QueryLimits) -> Self {
        Self {
            all: None,
            author: None,
            title: None,
            abstract_text: None,
            comments: None,
            journal_ref: None,
            report_num: None,
            acm_class: None,
            msc_class: None,
            doi: None,
            paper_id: None,
            orcid: None,
            author_id: None,
            license: None,
            primary_classification: Vec::new(),
            secondary_classification: Vec::new(),
            start_date: None,
            end_date: None,
            date_type: DateType::default(),
            order: SortOrder::default(),
            include: FieldSet::empty(),
            start: 0,
            size: limits.default_size,
        }
    }

    /// Build a query from raw key/value pairs, rejecting anything unknown or malformed
    pub fn from_pairs<I, K, V>(pairs: I, limits: &QueryLimits) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = Query::new(limits);
        let mut seen: Vec<Parameter> = Vec::new();

        for (key, value) in pairs {
            let key = key.as_ref();
            let value = value.as_ref().trim();
            let param = Parameter::from_key(key)
                .ok_or_else(|| ValidationError::UnknownParameter(key.to_string()))?;

            if !param.is_multi_valued() {
                if seen.contains(&param) {
                    return Err(ValidationError::DuplicateParameter(param.name().to_string()));
                }
                seen.push(param);
            }
            if value.is_empty() {
                return Err(ValidationError::EmptyValue(param.name().to_string()));
            }

            query.apply(param, value, limits)?;
        }

        query.validate(limits)?;
        Ok(query)
    }

    fn apply(&mut self, param: Parameter, value: &str, limits: &QueryLimits) -> Result<(), ValidationError> {
        let text = |p| TextQuery::parse(p, value).map(Some);
        let keyword = || Some(KeywordQuery::new(value));

        match param {
            Parameter::All => self.all = text(param)?,
            Parameter::Author => self.author = text(param)?,
            Parameter::Title => self.title = text(param)?,
            Parameter::Abstract => self.abstract_text = text(param)?,
            Parameter::Comments => self.comments = text(param)?,
            Parameter::JournalRef => self.journal_ref = text(param)?,
            Parameter::ReportNum => self.report_num = text(param)?,
            Parameter::AcmClass => self.acm_class = keyword(),
            Parameter::MscClass => self.msc_class = keyword(),
            Parameter::Doi => self.doi = keyword(),
            Parameter::PaperId => self.paper_id = keyword(),
            Parameter::Orcid => self.orcid = keyword(),
            Parameter::AuthorId => self.author_id = keyword(),
            Parameter::License => self.license = keyword(),
            Parameter::PrimaryClassification => {
                push_classifications(param, &mut self.primary_classification, value)?
            }
            Parameter::SecondaryClassification => {
                push_classifications(param, &mut self.secondary_classification, value)?
            }
            Parameter::StartDate => self.start_date = Some(parse_date(param, value)?),
            Parameter::EndDate => self.end_date = Some(parse_date(param, value)?),
            Parameter::DateType => self.date_type = value.parse()?,
            Parameter::Order => self.order = value.parse()?,
            Parameter::Include => {
                for name in split_list(param, value)? {
                    let field = FieldSet::from_field_name(name)
                        .ok_or_else(|| ValidationError::UnknownField(name.to_string()))?;
                    self.include |= field;
                }
            }
            Parameter::Start => {
                self.start = value.parse().map_err(|_| {
                    ValidationError::invalid("start", value, "must be a non-negative integer")
                })?;
            }
            Parameter::Size => {
                let size: i64 = value
                    .parse()
                    .map_err(|_| ValidationError::invalid("size", value, "must be an integer"))?;
                if size <= 0 {
                    return Err(ValidationError::invalid("size", value, "must be positive"));
                }
                if size as u64 > limits.max_size as u64 {
                    return Err(ValidationError::invalid(
                        "size",
                        value,
                        format!("must not exceed {}", limits.max_size),
                    ));
                }
                self.size = size as usize;
            }
        }
        Ok(())
    }

    /// Cross-parameter checks
    pub fn validate(&self, limits: &QueryLimits) -> Result<(), ValidationError> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(ValidationError::InvertedDateRange {
                    start: start.to_string(),
                    end: end.to_string(),
                });
            }
        }

        if self.size == 0 || self.size > limits.max_size {
            return Err(ValidationError::invalid(
                "size",
                self.size.to_string(),
                format!("must be between 1 and {}", limits.max_size),
            ));
        }

        let end = self.start.saturating_add(self.size);
        if end > limits.max_results {
            return Err(ValidationError::OutsideAllowedRange {
                start: self.start,
                end,
                max: limits.max_results,
            });
        }
        Ok(())
    }

    /// Applied parameters in canonical order, one entry per value
    pub fn applied_parameters(&self) -> Vec<QueryParameter> {
        let mut out = Vec::new();
        let mut push = |p: Parameter, v: &str| {
            out.push(QueryParameter {
                parameter: p.name().to_string(),
                value: v.to_string(),
            })
        };

        let texts = [
            (Parameter::All, &self.all),
            (Parameter::Author, &self.author),
            (Parameter::Title, &self.title),
            (Parameter::Abstract, &self.abstract_text),
            (Parameter::Comments, &self.comments),
            (Parameter::JournalRef, &self.journal_ref),
            (Parameter::ReportNum, &self.report_num),
        ];
        for (p, q) in texts {
            if let Some(q) = q {
                push(p, &q.raw);
            }
        }

        let keywords = [
            (Parameter::AcmClass, &self.acm_class),
            (Parameter::MscClass, &self.msc_class),
            (Parameter::Doi, &self.doi),
            (Parameter::PaperId, &self.paper_id),
            (Parameter::Orcid, &self.orcid),
            (Parameter::AuthorId, &self.author_id),
            (Parameter::License, &self.license),
        ];
        for (p, q) in keywords {
            if let Some(q) = q {
                push(p, &q.raw);
            }
        }

        for token in &self.primary_classification {
            push(Parameter::PrimaryClassification, token.as_str());
        }
        for token in &self.secondary_classification {
            push(Parameter::SecondaryClassification, token.as_str());
        }

        if let Some(d) = self.start_date {
            push(Parameter::StartDate, &d.to_string());
        }
        if let Some(d) = self.end_date {
            push(Parameter::EndDate, &d.to_string());
        }
        if self.start_date.is_some() || self.end_date.is_some() {
            push(Parameter::DateType, self.date_type.as_str());
        }
        if self.order != SortOrder::default() {
            push(Parameter::Order, self.order.as_str());
        }

        for name in self.include.names() {
            push(Parameter::Include, name);
        }
        out
    }
}

/// Split a comma-separated value; a value with no items is blank
fn split_list(param: Parameter, value: &str) -> Result<Vec<&str>, ValidationError> {
    let items: Vec<&str> = value.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    if items.is_empty() {
        return Err(ValidationError::EmptyValue(param.name().to_string()));
    }
    Ok(items)
}

fn push_classifications(
    param: Parameter,
    target: &mut Vec<ClassificationToken>,
    value: &str,
) -> Result<(), ValidationError> {
    for raw in split_list(param, value)? {
        let token = ClassificationToken::parse(raw);
        if !target.contains(&token) {
            target.push(token);
        }
    }
    Ok(())
}

fn parse_date(param: Parameter, value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ValidationError::invalid(param.name(), value, "expected YYYY-MM-DD"))
}
