//! Query execution and result shaping.
//!
//! [`SearchService`] ties the pieces together: it parses raw parameters into
//! a [`Query`](crate::models::Query), compiles a plan against the store's
//! capabilities, runs it under a timeout and projects the resulting
//! documents into a [`ResultEnvelope`](crate::models::ResultEnvelope).

mod executor;
mod projector;

pub use executor::SearchService;
pub use projector::Projector;

use http::StatusCode;

use crate::plan::CompileError;
use crate::store::StoreError;
use crate::utils::ValidationError;

/// Failures while running a plan against the store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    #[error("Document store timed out: {0}")]
    Timeout(String),

    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    #[error("Document store returned malformed data: {0}")]
    Corrupt(String),
}

/// Every way a search or lookup can fail
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("No paper found with id {0}")]
    NotFound(String),

    #[error(transparent)]
    Compile(#[from] CompileError),

    /// The store refused a query that passed validation
    #[error("Query rejected by document store: {0}")]
    Rejected(String),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl From<StoreError> for SearchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout(msg) => ExecutionError::Timeout(msg).into(),
            StoreError::Unavailable(msg) | StoreError::Io(msg) => ExecutionError::Unavailable(msg).into(),
            StoreError::Corrupt(msg) => ExecutionError::Corrupt(msg).into(),
            StoreError::InvalidQuery(msg) => SearchError::Rejected(msg),
        }
    }
}

impl SearchError {
    /// HTTP status this error maps to
    pub fn status(&self) -> StatusCode {
        match self {
            SearchError::Validation(_) | SearchError::Compile(_) | SearchError::Rejected(_) => {
                StatusCode::BAD_REQUEST
            }
            SearchError::NotFound(_) => StatusCode::NOT_FOUND,
            SearchError::Execution(ExecutionError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            SearchError::Execution(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message safe to return to clients; store details stay in the logs
    pub fn public_message(&self) -> String {
        match self {
            SearchError::Rejected(_) => "The query could not be evaluated by the document store".to_string(),
            SearchError::Execution(ExecutionError::Timeout(_)) => {
                "The document store did not respond in time".to_string()
            }
            SearchError::Execution(_) => "The document store is unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            SearchError::from(ValidationError::UnknownParameter("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(SearchError::NotFound("1811.00536".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            SearchError::from(CompileError::UnsupportedFilter { parameter: "orcid".into() }).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SearchError::from(StoreError::Timeout("slow".into())).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            SearchError::from(StoreError::Corrupt("bad".into())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            SearchError::from(StoreError::Io("gone".into())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            SearchError::from(StoreError::InvalidQuery("parse".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_public_message_hides_store_details() {
        let err = SearchError::from(StoreError::Unavailable("connection refused to 10.0.0.5".into()));
        assert!(!err.public_message().contains("10.0.0.5"));

        let err = SearchError::from(StoreError::InvalidQuery("[1:20] unknown token".into()));
        assert!(!err.public_message().contains("unknown token"));

        let err = SearchError::from(ValidationError::UnknownParameter("foo".into()));
        assert_eq!(err.public_message(), "Unknown parameter: foo");
    }
}
