//! Document-store adapter over the Astra DB Data API.
//!
//! Each operation targets one collection. Similarity search sorts either by
//! an explicit `$vector` (embedding computed here) or by `$vectorize`, which
//! lets the collection embed the raw query text itself.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::config::AstraConfig;
use crate::core::errors::BackendError;
use crate::llm::LanguageModel;
use super::contract::{
    or_empty, unsupported, MessageFormat, ProviderId, RenderedResult, SearchBackend,
};
use super::document::Document;

pub const VISITOR_EVIDENCE_COLLECTION: &str = "visitorevidence";
pub const ASSERTIONS_COLLECTION: &str = "assertions";
pub const BLOGS_COLLECTION: &str = "blogs";

/// Data API `insertMany` accepts at most this many documents per command.
const INSERT_BATCH_SIZE: usize = 100;

pub struct AstraBackend {
    endpoint: String,
    token: String,
    keyspace: String,
    timeout: Duration,
    llm: Arc<dyn LanguageModel>,
    client: RwLock<Option<Client>>,
}

impl AstraBackend {
    pub fn new(config: &AstraConfig, timeout: Duration, llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_default()
                .trim_end_matches('/')
                .to_string(),
            token: config.token.clone().unwrap_or_default(),
            keyspace: config.keyspace.clone(),
            timeout,
            llm,
            client: RwLock::new(None),
        }
    }

    /// Clones the live client so an in-flight call survives a concurrent close.
    fn connection(&self) -> Result<Client, BackendError> {
        self.client
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| BackendError::Connection("Astra DB connection is not initialized".into()))
    }

    fn keyspace_url(&self) -> String {
        format!("{}/api/json/v1/{}", self.endpoint, self.keyspace)
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{}", self.keyspace_url(), collection)
    }

    async fn command(&self, url: &str, body: Value) -> Result<Value, BackendError> {
        let client = self.connection()?;
        let res = client
            .post(url)
            .header("Token", &self.token)
            .json(&body)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(BackendError::Upstream(format!(
                "Astra DB returned {}: {}",
                status, text
            )));
        }

        let payload: Value = res.json().await?;
        if let Some(errors) = payload.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                return Err(BackendError::Upstream(format!(
                    "Astra DB command failed: {}",
                    Value::Array(errors.clone())
                )));
            }
        }
        Ok(payload)
    }

    async fn find(
        &self,
        collection: &str,
        sort: Value,
        projection: Option<Value>,
        limit: usize,
    ) -> Result<Vec<Document>, BackendError> {
        let mut find = json!({
            "sort": sort,
            "options": { "limit": limit, "includeSimilarity": true },
        });
        if let Some(projection) = projection {
            find["projection"] = projection;
        }

        tracing::debug!(collection, limit, "Astra DB vector find");
        let payload = self
            .command(&self.collection_url(collection), json!({ "find": find }))
            .await?;

        let documents = payload["data"]["documents"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        Ok(documents
            .into_iter()
            .filter_map(Document::from_value)
            .map(|mut doc| {
                if let Some(similarity) = doc.remove("$similarity") {
                    doc.insert("score", similarity);
                }
                doc
            })
            .collect())
    }

    async fn vector_find(
        &self,
        collection: &str,
        query: &str,
        projection: Value,
        limit: usize,
    ) -> Result<Vec<Document>, BackendError> {
        let embedding = self.llm.embed(query).await?;
        self.find(
            collection,
            json!({ "$vector": embedding }),
            Some(projection),
            limit,
        )
        .await
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<bool, BackendError> {
        let url = self.collection_url(collection);
        let total = documents.len();
        let values: Vec<Value> = documents.into_iter().map(Document::into_value).collect();

        for batch in values.chunks(INSERT_BATCH_SIZE) {
            self.command(&url, json!({ "insertMany": { "documents": batch } }))
                .await?;
        }

        tracing::info!("Uploaded {} documents to {}", total, collection);
        Ok(true)
    }
}

#[async_trait]
impl SearchBackend for AstraBackend {
    fn provider(&self) -> ProviderId {
        ProviderId::Astra
    }

    async fn initialize_connection(&self) -> Result<(), BackendError> {
        if self.endpoint.is_empty() {
            return Err(BackendError::Connection(
                "Astra DB endpoint is required but not configured".into(),
            ));
        }
        if self.token.trim().is_empty() {
            return Err(BackendError::Connection(
                "Astra DB token is required but not configured".into(),
            ));
        }

        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(BackendError::connection)?;
        *self.client.write().unwrap_or_else(|e| e.into_inner()) = Some(client);

        tracing::info!("Astra DB connection initialized successfully");
        Ok(())
    }

    async fn close_connection(&self) -> Result<(), BackendError> {
        let previous = self.client.write().unwrap_or_else(|e| e.into_inner()).take();
        if previous.is_some() {
            tracing::info!("Astra DB connection closed");
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        match self
            .command(&self.keyspace_url(), json!({ "findCollections": {} }))
            .await
        {
            Ok(_) => true,
            Err(err) => {
                tracing::error!("Astra DB health check failed: {}", err);
                false
            }
        }
    }

    async fn get_visitor_evidence_context(&self, query: &str, limit: usize) -> Vec<Document> {
        let projection = json!({ "Name": 1, "PolicyAssertion": 1, "Evidence": 1, "Year": 1 });
        or_empty(
            "get_visitor_evidence_context",
            self.vector_find(VISITOR_EVIDENCE_COLLECTION, query, projection, limit)
                .await,
        )
    }

    async fn get_policy_assertions(&self, query: &str, limit: usize) -> Vec<Document> {
        let projection =
            json!({ "Name": 1, "PolicyAssertion": 1, "Page": 1, "Year": 1, "Link": 1 });
        or_empty(
            "get_policy_assertions",
            self.vector_find(ASSERTIONS_COLLECTION, query, projection, limit)
                .await,
        )
    }

    async fn get_blog_assertions(&self, query: &str, limit: usize) -> Vec<Document> {
        or_empty(
            "get_blog_assertions",
            self.find(BLOGS_COLLECTION, json!({ "$vectorize": query }), None, limit)
                .await,
        )
    }

    async fn get_message_descriptions(&self, _query: &str, _limit: usize) -> RenderedResult {
        unsupported(self.provider(), "get_message_descriptions")
    }

    async fn get_messages_since(
        &self,
        _since: DateTime<Utc>,
        _format: MessageFormat,
    ) -> RenderedResult {
        unsupported(self.provider(), "get_messages_since")
    }

    async fn upload_documents(&self, collection: &str, documents: Vec<Document>) -> bool {
        if documents.is_empty() {
            tracing::warn!("No documents provided for upload");
            return false;
        }
        or_empty(
            "upload_documents",
            self.insert_many(collection, documents).await,
        )
    }

    async fn delete_document_by_id(&self, _collection: &str, _document_id: &str) -> bool {
        unsupported(self.provider(), "delete_document_by_id")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedModel, StubServer};
    use axum::http::StatusCode;

    async fn connected(server: &StubServer, llm: Arc<ScriptedModel>) -> AstraBackend {
        let config = AstraConfig {
            endpoint: Some(server.base_url.clone()),
            token: Some("AstraCS:test".to_string()),
            keyspace: "default_keyspace".to_string(),
        };
        let backend = AstraBackend::new(&config, Duration::from_secs(5), llm);
        backend.initialize_connection().await.unwrap();
        backend
    }

    #[tokio::test]
    async fn initialize_without_token_is_connection_error() {
        let config = AstraConfig {
            endpoint: Some("https://astra.example".to_string()),
            token: None,
            ..AstraConfig::default()
        };
        let backend = AstraBackend::new(&config, Duration::from_secs(5), Arc::new(ScriptedModel::new()));

        let err = backend.initialize_connection().await.unwrap_err();

        assert!(matches!(err, BackendError::Connection(_)));
    }

    #[tokio::test]
    async fn policy_search_sorts_by_embedding_and_annotates_score() {
        let server = StubServer::start(|_req| {
            (
                StatusCode::OK,
                json!({ "data": { "documents": [
                    { "_id": "a1", "Name": "Plan", "PolicyAssertion": "Protect peat", "$similarity": 0.91 }
                ] } }),
            )
        })
        .await;
        let llm = Arc::new(ScriptedModel::new());
        let backend = connected(&server, llm.clone()).await;

        let docs = backend.get_policy_assertions("peatland", 8).await;

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].number("score"), 0.91);
        assert!(docs[0].get("$similarity").is_none());
        assert_eq!(llm.embedded(), vec!["peatland".to_string()]);

        let request = &server.requests()[0];
        assert_eq!(request.path, "/api/json/v1/default_keyspace/assertions");
        assert_eq!(
            request.headers.get("token").and_then(|v| v.to_str().ok()),
            Some("AstraCS:test")
        );
        let find = &request.body["find"];
        assert_eq!(find["sort"]["$vector"], json!([0.1f32, 0.2f32, 0.3f32]));
        assert_eq!(find["options"]["limit"], json!(8));
        assert_eq!(find["projection"]["Link"], json!(1));
    }

    #[tokio::test]
    async fn blog_search_uses_server_side_vectorize() {
        let server = StubServer::start(|_req| {
            (StatusCode::OK, json!({ "data": { "documents": [] } }))
        })
        .await;
        let llm = Arc::new(ScriptedModel::new());
        let backend = connected(&server, llm.clone()).await;

        let docs = backend.get_blog_assertions("rewilding", 18).await;

        assert!(docs.is_empty());
        assert!(llm.embedded().is_empty());
        let find = &server.requests()[0].body["find"];
        assert_eq!(find["sort"], json!({ "$vectorize": "rewilding" }));
        assert!(find.get("projection").is_none());
    }

    #[tokio::test]
    async fn embedding_failure_degrades_to_empty() {
        let server = StubServer::start(|_req| (StatusCode::OK, json!({}))).await;
        let llm = Arc::new(ScriptedModel::new().failing_embeddings());
        let backend = connected(&server, llm).await;

        let docs = backend.get_visitor_evidence_context("access", 5).await;

        assert!(docs.is_empty());
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn command_errors_degrade_upload_to_false() {
        let server = StubServer::start(|_req| {
            (StatusCode::OK, json!({ "errors": [{ "message": "collection not found" }] }))
        })
        .await;
        let backend = connected(&server, Arc::new(ScriptedModel::new())).await;

        let uploaded = backend
            .upload_documents("assertions", vec![Document::new().with("Name", "x")])
            .await;

        assert!(!uploaded);
    }

    #[tokio::test]
    async fn unsupported_operations_return_empty_values() {
        let server = StubServer::start(|_req| (StatusCode::OK, json!({}))).await;
        let backend = connected(&server, Arc::new(ScriptedModel::new())).await;

        assert_eq!(
            backend.get_message_descriptions("q", 10).await,
            RenderedResult::default()
        );
        assert_eq!(
            backend
                .get_messages_since(Utc::now(), MessageFormat::Html)
                .await,
            RenderedResult::default()
        );
        assert!(backend.search_messages("q", 10).await.is_empty());
        assert!(!backend.delete_document_by_id("assertions", "a1").await);
        assert!(!backend.retag_all_messages().await);
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn close_is_idempotent_and_health_fails_afterwards() {
        let server = StubServer::start(|_req| (StatusCode::OK, json!({ "status": {} }))).await;
        let backend = connected(&server, Arc::new(ScriptedModel::new())).await;

        assert!(backend.health_check().await);
        backend.close_connection().await.unwrap();
        backend.close_connection().await.unwrap();
        assert!(!backend.health_check().await);
    }
}
