//! Store-neutral wildcard patterns.
//!
//! A pattern is a sequence of literal runs and wildcards. Each store renders
//! it into its own syntax: an anchored regex for the in-memory store, the
//! `wildcard` query syntax for Elasticsearch.

use crate::models::text::{ANY_MANY, ANY_ONE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// Exactly one character
    AnyOne,
    /// Zero or more characters
    AnyMany,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    segments: Vec<Segment>,
}

impl Pattern {
    /// Parse `*` and `?` as wildcards; everything else is literal
    pub fn parse(raw: &str) -> Self {
        let mut segments: Vec<Segment> = Vec::new();
        for c in raw.chars() {
            match c {
                ANY_MANY => {
                    if segments.last() != Some(&Segment::AnyMany) {
                        segments.push(Segment::AnyMany);
                    }
                }
                ANY_ONE => segments.push(Segment::AnyOne),
                c => match segments.last_mut() {
                    Some(Segment::Literal(s)) => s.push(c),
                    _ => segments.push(Segment::Literal(c.to_string())),
                },
            }
        }
        Self { segments }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::Literal(value.into())],
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The literal value when the pattern has no wildcards
    pub fn as_literal(&self) -> Option<&str> {
        match self.segments.as_slice() {
            [Segment::Literal(s)] => Some(s),
            [] => Some(""),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        self.as_literal().is_some()
    }

    /// Case-insensitive regex anchored to the whole value
    pub fn to_regex(&self) -> String {
        let mut out = String::from("(?i)^");
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(&regex::escape(s)),
                Segment::AnyOne => out.push('.'),
                Segment::AnyMany => out.push_str(".*"),
            }
        }
        out.push('$');
        out
    }

    /// Elasticsearch `wildcard` query syntax; literal `*`, `?` and `\` are escaped
    pub fn to_wildcard(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => {
                    for c in s.chars() {
                        if matches!(c, '*' | '?' | '\\') {
                            out.push('\\');
                        }
                        out.push(c);
                    }
                }
                Segment::AnyOne => out.push('?'),
                Segment::AnyMany => out.push('*'),
            }
        }
        out
    }
}
