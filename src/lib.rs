//! # Paper Search
//!
//! A faceted metadata search service for versioned academic paper records.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Documents, queries and the response envelope
//! - [`plan`]: Compiles a query into a store-neutral predicate tree
//! - [`store`]: The `DocumentStore` trait with in-memory and Elasticsearch backends
//! - [`search`]: Executes plans and projects results
//! - [`api`]: axum HTTP surface
//! - [`utils`]: Identifier parsing and validation errors
//! - [`config`]: Configuration management

pub mod api;
pub mod config;
pub mod models;
pub mod plan;
pub mod search;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use models::{Document, Query, ResultEnvelope};
pub use search::{SearchError, SearchService};
pub use store::{DocumentStore, StoreError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
