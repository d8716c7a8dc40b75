//! Input validation for request parameters and paper identifiers.
//!
//! Every error carries the offending parameter name and value so the API
//! layer can build a message without consulting the store.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Validation error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Parameter '{0}' may only be given once")]
    DuplicateParameter(String),

    #[error("Parameter '{0}' must not be empty")]
    EmptyValue(String),

    #[error("Invalid value '{value}' for '{parameter}': {reason}")]
    InvalidValue {
        parameter: String,
        value: String,
        reason: String,
    },

    #[error("Unknown field in include: {0}")]
    UnknownField(String),

    #[error("start_date {start} is after end_date {end}")]
    InvertedDateRange { start: String, end: String },

    #[error("Requested results {start}..{end}, but at most {max} results are available")]
    OutsideAllowedRange { start: usize, end: usize, max: usize },

    #[error("Invalid paper ID: {0}")]
    InvalidPaperId(String),
}

impl ValidationError {
    pub fn invalid(
        parameter: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ValidationError::InvalidValue {
            parameter: parameter.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Name of the parameter the error refers to
    pub fn parameter(&self) -> &str {
        match self {
            ValidationError::UnknownParameter(p)
            | ValidationError::DuplicateParameter(p)
            | ValidationError::EmptyValue(p) => p,
            ValidationError::InvalidValue { parameter, .. } => parameter,
            ValidationError::UnknownField(_) => "include",
            ValidationError::InvertedDateRange { .. } => "start_date",
            ValidationError::OutsideAllowedRange { .. } => "start",
            ValidationError::InvalidPaperId(_) => "id",
        }
    }
}

/// A paper identifier with an optional version suffix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperIdentifier {
    pub paper_id: String,
    pub version: Option<u32>,
}

impl PaperIdentifier {
    /// Versioned form when a version was given, else the bare id
    pub fn display_id(&self) -> String {
        match self.version {
            Some(v) => crate::models::versioned_id(&self.paper_id, v),
            None => self.paper_id.clone(),
        }
    }
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // New style: YYMM.NNNN(N); old style: archive(.SC)/YYMMNNN
        Regex::new(r"^(?P<id>\d{4}\.\d{4,5}|[a-z]+(?:-[a-z]+)*(?:\.[A-Z]{2})?/\d{7})(?:v(?P<v>\d+))?$")
            .expect("identifier pattern is valid")
    })
}

/// Parse an arXiv-style identifier, optionally prefixed with `arXiv:` and
/// optionally suffixed with a version.
///
/// - `1811.00536` → paper `1811.00536`, no version
/// - `1811.00536v2` → paper `1811.00536`, version 2
/// - `arXiv:hep-th/9901001v1` → paper `hep-th/9901001`, version 1
pub fn parse_paper_identifier(raw: &str) -> Result<PaperIdentifier, ValidationError> {
    let id = raw.trim();

    if id.is_empty() {
        return Err(ValidationError::InvalidPaperId("empty ID".to_string()));
    }

    let id = match id.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("arxiv:") => &id[6..],
        _ => id,
    };

    let caps = identifier_pattern()
        .captures(id)
        .ok_or_else(|| ValidationError::InvalidPaperId(raw.to_string()))?;

    let version = match caps.name("v") {
        Some(v) => {
            let n: u32 = v
                .as_str()
                .parse()
                .map_err(|_| ValidationError::InvalidPaperId(raw.to_string()))?;
            if n == 0 {
                return Err(ValidationError::InvalidPaperId(raw.to_string()));
            }
            Some(n)
        }
        None => None,
    };

    Ok(PaperIdentifier {
        paper_id: caps["id"].to_string(),
        version,
    })
}
