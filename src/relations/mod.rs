//! Read-only graph lookups that add relationship context to a query.

pub mod neo4j;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::BackendError;

pub use neo4j::Neo4jStore;

/// One edge between two named entities, as stored in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source_name: String,
    pub relationship: String,
    pub target_name: String,
    pub criticality: String,
    pub evidence: String,
}

#[async_trait]
pub trait RelationshipStore: Send + Sync {
    async fn query_relationships(&self, search_term: &str)
        -> Result<Vec<Relationship>, BackendError>;
}

/// `source - relationship - target (Criticality: c)` followed by the evidence line.
pub fn format_graph_results(rows: &[Relationship]) -> String {
    rows.iter()
        .map(|row| {
            format!(
                "{} - {} - {} (Criticality: {})\n{}\n\n",
                row.source_name, row.relationship, row.target_name, row.criticality, row.evidence
            )
        })
        .collect()
}
