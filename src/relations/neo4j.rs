use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::config::GraphConfig;
use crate::core::errors::BackendError;
use super::{Relationship, RelationshipStore};

/// Expands the ten relationships nearest the search term to every edge
/// between their endpoint nodes.
const GRAPH_RAG_QUERY: &str = "\
WITH genai.vector.encode($searchTerm, 'OpenAI', { token: $token }) AS embedding2Search
CALL db.index.vector.queryRelationships('z', 10, embedding2Search)
YIELD relationship AS rel, score
WITH collect(DISTINCT startNode(rel)) + collect(DISTINCT endNode(rel)) AS nodes
UNWIND nodes AS node
WITH collect(DISTINCT node) AS distinctNodes
MATCH (n)-[r]->(m)
WHERE n IN distinctNodes AND m IN distinctNodes
RETURN DISTINCT n.name, r.Relationship, m.name, r.Criticality, r.`Evidence base`";

/// Neo4j reached through the HTTP transactional endpoint.
pub struct Neo4jStore {
    client: Client,
    commit_url: String,
    user: String,
    password: String,
    embedding_token: String,
}

impl Neo4jStore {
    /// Returns `None` when no graph URL is configured.
    pub fn from_config(
        config: &GraphConfig,
        timeout: Duration,
    ) -> Result<Option<Self>, BackendError> {
        let Some(url) = config.url.as_deref().filter(|u| !u.trim().is_empty()) else {
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BackendError::connection)?;

        Ok(Some(Self {
            client,
            commit_url: format!(
                "{}/db/{}/tx/commit",
                url.trim_end_matches('/'),
                config.database
            ),
            user: config.user.clone(),
            password: config.password.clone().unwrap_or_default(),
            embedding_token: config.embedding_token.clone().unwrap_or_default(),
        }))
    }
}

fn cell(row: &[Value], index: usize) -> String {
    match row.get(index) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[async_trait]
impl RelationshipStore for Neo4jStore {
    async fn query_relationships(
        &self,
        search_term: &str,
    ) -> Result<Vec<Relationship>, BackendError> {
        let body = json!({
            "statements": [{
                "statement": GRAPH_RAG_QUERY,
                "parameters": { "searchTerm": search_term, "token": self.embedding_token },
            }]
        });

        let res = self
            .client
            .post(&self.commit_url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(BackendError::Upstream(format!(
                "Neo4j returned {}",
                res.status()
            )));
        }

        let payload: Value = res.json().await?;
        if let Some(errors) = payload["errors"].as_array() {
            if let Some(first) = errors.first() {
                return Err(BackendError::Upstream(format!(
                    "Neo4j query failed: {}",
                    first["message"].as_str().unwrap_or("unknown error")
                )));
            }
        }

        let rows = payload["results"][0]["data"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        Ok(rows
            .iter()
            .filter_map(|entry| entry["row"].as_array())
            .map(|row| Relationship {
                source_name: cell(row, 0),
                relationship: cell(row, 1),
                target_name: cell(row, 2),
                criticality: cell(row, 3),
                evidence: cell(row, 4),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubServer;
    use axum::http::StatusCode;

    fn config(url: &str) -> GraphConfig {
        GraphConfig {
            url: Some(url.to_string()),
            password: Some("pw".to_string()),
            embedding_token: Some("sk-graph".to_string()),
            ..GraphConfig::default()
        }
    }

    #[test]
    fn missing_url_disables_the_store() {
        let store = Neo4jStore::from_config(&GraphConfig::default(), Duration::from_secs(1)).unwrap();
        assert!(store.is_none());
    }

    #[tokio::test]
    async fn rows_are_mapped_in_column_order() {
        let server = StubServer::start(|_req| {
            (
                StatusCode::OK,
                json!({
                    "results": [{
                        "columns": ["n.name", "r.Relationship", "m.name", "r.Criticality", "r.`Evidence base`"],
                        "data": [{ "row": ["Peat", "STORES", "Carbon", 3, "IUCN 2020"] }]
                    }],
                    "errors": []
                }),
            )
        })
        .await;
        let store = Neo4jStore::from_config(&config(&server.base_url), Duration::from_secs(5))
            .unwrap()
            .unwrap();

        let rows = store.query_relationships("carbon").await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source_name, "Peat");
        assert_eq!(rows[0].criticality, "3");
        assert_eq!(rows[0].evidence, "IUCN 2020");

        let request = &server.requests()[0];
        assert_eq!(request.path, "/db/neo4j/tx/commit");
        let params = &request.body["statements"][0]["parameters"];
        assert_eq!(params["searchTerm"], json!("carbon"));
        assert_eq!(params["token"], json!("sk-graph"));
        assert!(request.headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn cypher_errors_are_upstream_failures() {
        let server = StubServer::start(|_req| {
            (
                StatusCode::OK,
                json!({ "results": [], "errors": [{ "message": "Unknown procedure" }] }),
            )
        })
        .await;
        let store = Neo4jStore::from_config(&config(&server.base_url), Duration::from_secs(5))
            .unwrap()
            .unwrap();

        let err = store.query_relationships("x").await.unwrap_err();

        assert!(err.to_string().contains("Unknown procedure"));
    }
}
