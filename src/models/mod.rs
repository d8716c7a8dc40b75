//! Core data models for paper documents and search requests.

mod document;
mod envelope;
mod fields;
mod query;
pub mod text;

pub use document::{
    versioned_id, Classification, ClassificationTerm, Document, DocumentBuilder, License, Person,
    YearMonth,
};
pub use envelope::{Metadata, Projection, ResultEnvelope};
pub use fields::FieldSet;
pub use query::{
    ClassificationToken, DateType, KeywordQuery, Parameter, Query, QueryLimits, QueryParameter,
    SortOrder, TextQuery,
};
pub use text::TextTerm;
