//! Search response envelope.

use serde::{Deserialize, Serialize};

use super::query::QueryParameter;

/// A projected document, keyed by response field name
pub type Projection = serde_json::Map<String, serde_json::Value>;

/// Envelope metadata describing the executed query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub start: usize,
    pub size: usize,
    /// Total matching documents, independent of the page window
    pub total: usize,
    pub query: Vec<QueryParameter>,
}

/// Top-level response for a search: metadata plus one page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub metadata: Metadata,
    pub results: Vec<Projection>,
}

impl ResultEnvelope {
    pub fn new(metadata: Metadata, results: Vec<Projection>) -> Self {
        Self { metadata, results }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_shape() {
        let envelope = ResultEnvelope::new(
            Metadata {
                start: 0,
                size: 10,
                total: 0,
                query: vec![QueryParameter {
                    parameter: "title".into(),
                    value: "muon".into(),
                }],
            },
            Vec::new(),
        );
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["metadata"]["query"][0]["parameter"], "title");
        assert_eq!(json["metadata"]["total"], 0);
        assert!(json["results"].as_array().unwrap().is_empty());
    }
}
