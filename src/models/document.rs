//! Document model representing one version of a paper's metadata record.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One level of the classification taxonomy (group, archive or category)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationTerm {
    /// Taxonomy identifier, e.g. `grp_physics`, `astro-ph`, `astro-ph.CO`
    pub id: String,

    /// Human-readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ClassificationTerm {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }
}

/// A group/archive/category triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub group: ClassificationTerm,
    pub archive: ClassificationTerm,
    pub category: ClassificationTerm,
}

impl Classification {
    /// Build a classification from bare identifiers
    pub fn new(group: &str, archive: &str, category: &str) -> Self {
        Self {
            group: ClassificationTerm::new(group),
            archive: ClassificationTerm::new(archive),
            category: ClassificationTerm::new(category),
        }
    }
}

/// A structured author entry
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Person {
    pub full_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,

    #[serde(default)]
    pub affiliation: Vec<String>,

    /// ORCID iD, e.g. `0000-0002-1825-0097`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,

    /// arXiv author identifier, e.g. `doe_j_1`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
}

impl Person {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            ..Default::default()
        }
    }
}

/// License reference attached to a paper version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub uri: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Year-month granularity date, serialized as `YYYY-MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Truncate a calendar date to its year and month
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got '{}'", s))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("invalid year in '{}'", s))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("invalid month in '{}'", s))?;
        YearMonth::new(year, month).ok_or_else(|| format!("month out of range in '{}'", s))
    }
}

impl Serialize for YearMonth {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One version of a paper's metadata record
///
/// Documents are produced by an external ingestion process and are read-only
/// to this crate. `paper_id_v` is always `paper_id` + `v` + `version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub paper_id: String,
    pub paper_id_v: String,
    pub version: u32,

    pub title: String,

    pub r#abstract: String,

    /// Author string as submitted
    #[serde(default)]
    pub authors_freeform: String,

    #[serde(default)]
    pub authors: Vec<Person>,

    pub primary_classification: Classification,

    #[serde(default)]
    pub secondary_classification: Vec<Classification>,

    pub submitted_date: DateTime<FixedOffset>,

    pub submitted_date_first: DateTime<FixedOffset>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announced_date_first: Option<YearMonth>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,

    #[serde(default)]
    pub formats: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_ref: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_num: Option<String>,

    #[serde(default)]
    pub acm_class: Vec<String>,

    #[serde(default)]
    pub msc_class: Vec<String>,

    #[serde(default)]
    pub doi: Vec<String>,

    #[serde(default)]
    pub is_current: bool,

    #[serde(default)]
    pub is_withdrawn: bool,
}

impl Document {
    /// Whether `paper_id_v` agrees with `paper_id` and `version`
    pub fn has_consistent_id(&self) -> bool {
        self.paper_id_v == versioned_id(&self.paper_id, self.version)
    }
}

/// Format a versioned identifier, e.g. `1811.00536v2`
pub fn versioned_id(paper_id: &str, version: u32) -> String {
    format!("{}v{}", paper_id, version)
}

/// Builder for constructing Document values
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    document: Document,
}

impl DocumentBuilder {
    /// Create a builder for a paper version; dates default to the given submission time
    pub fn new(
        paper_id: impl Into<String>,
        version: u32,
        title: impl Into<String>,
        submitted: DateTime<FixedOffset>,
    ) -> Self {
        let paper_id = paper_id.into();
        Self {
            document: Document {
                paper_id_v: versioned_id(&paper_id, version),
                paper_id,
                version,
                title: title.into(),
                r#abstract: String::new(),
                authors_freeform: String::new(),
                authors: Vec::new(),
                primary_classification: Classification::new("grp_physics", "physics", "physics.gen-ph"),
                secondary_classification: Vec::new(),
                submitted_date: submitted,
                submitted_date_first: submitted,
                announced_date_first: None,
                license: None,
                formats: Vec::new(),
                comments: None,
                journal_ref: None,
                report_num: None,
                acm_class: Vec::new(),
                msc_class: Vec::new(),
                doi: Vec::new(),
                is_current: true,
                is_withdrawn: false,
            },
        }
    }

    pub fn abstract_text(mut self, text: impl Into<String>) -> Self {
        self.document.r#abstract = text.into();
        self
    }

    /// Add a structured author and append it to the free-form string
    pub fn author(mut self, person: Person) -> Self {
        if !self.document.authors_freeform.is_empty() {
            self.document.authors_freeform.push_str(", ");
        }
        self.document.authors_freeform.push_str(&person.full_name);
        self.document.authors.push(person);
        self
    }

    pub fn primary(mut self, classification: Classification) -> Self {
        self.document.primary_classification = classification;
        self
    }

    pub fn secondary(mut self, classification: Classification) -> Self {
        self.document.secondary_classification.push(classification);
        self
    }

    pub fn submitted_date_first(mut self, date: DateTime<FixedOffset>) -> Self {
        self.document.submitted_date_first = date;
        self
    }

    pub fn announced(mut self, year: i32, month: u32) -> Self {
        self.document.announced_date_first = YearMonth::new(year, month);
        self
    }

    pub fn license(mut self, uri: impl Into<String>) -> Self {
        self.document.license = Some(License {
            uri: uri.into(),
            label: None,
        });
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.document.formats.push(format.into());
        self
    }

    pub fn comments(mut self, comments: impl Into<String>) -> Self {
        self.document.comments = Some(comments.into());
        self
    }

    pub fn journal_ref(mut self, journal_ref: impl Into<String>) -> Self {
        self.document.journal_ref = Some(journal_ref.into());
        self
    }

    pub fn report_num(mut self, report_num: impl Into<String>) -> Self {
        self.document.report_num = Some(report_num.into());
        self
    }

    pub fn acm_class(mut self, class: impl Into<String>) -> Self {
        self.document.acm_class.push(class.into());
        self
    }

    pub fn msc_class(mut self, class: impl Into<String>) -> Self {
        self.document.msc_class.push(class.into());
        self
    }

    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        self.document.doi.push(doi.into());
        self
    }

    pub fn current(mut self, is_current: bool) -> Self {
        self.document.is_current = is_current;
        self
    }

    pub fn build(self) -> Document {
        self.document
    }
}
