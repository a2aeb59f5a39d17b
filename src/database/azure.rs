//! Indexed-search adapter over the Azure AI Search REST API.
//!
//! Messages live in a single index. Uploads are enriched before indexing:
//! a missing embedding, summary or tag is derived first, and any enrichment
//! failure aborts the whole batch.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use crate::core::config::AzureConfig;
use crate::core::errors::BackendError;
use crate::llm::LanguageModel;
use super::contract::{
    or_else_report, or_empty, unsupported, DocumentEnricher, MessageFormat, ProviderId,
    RenderedResult, SearchBackend,
};
use super::document::Document;
use super::table::render_message_table;

pub const MESSAGE_INDEX: &str = "messages";
pub const MESSAGE_FIELDS: [&str; 6] = ["id", "message", "summary", "uploadDate", "tag", "url"];
pub const VECTOR_FIELD: &str = "content_vector";

const PAGE_SIZE: usize = 1000;

/// Client bound to one index's `docs` collection.
struct IndexClient {
    http: Client,
    base: String,
    key: String,
    api_version: String,
}

impl IndexClient {
    fn docs_url(&self, suffix: &str) -> String {
        format!("{}{}", self.base, suffix)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let res = request
            .header("api-key", &self.key)
            .query(&[("api-version", self.api_version.as_str())])
            .send()
            .await?;
        Ok(res)
    }

    async fn search(&self, body: Value) -> Result<Vec<Document>, BackendError> {
        let res = self
            .send(self.http.post(self.docs_url("/search")).json(&body))
            .await?;
        let payload = expect_success(res).await?;

        Ok(payload["value"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(Document::from_value)
            .collect())
    }

    /// Pages through every match in `top`-sized slices.
    async fn search_all(&self, mut body: Value) -> Result<Vec<Document>, BackendError> {
        let mut all = Vec::new();
        let mut skip = 0usize;
        loop {
            body["top"] = json!(PAGE_SIZE);
            body["skip"] = json!(skip);
            let page = self.search(body.clone()).await?;
            let fetched = page.len();
            all.extend(page);
            if fetched < PAGE_SIZE {
                break;
            }
            skip += PAGE_SIZE;
        }
        Ok(all)
    }

    async fn index(&self, action: &str, documents: Vec<Document>) -> Result<(), BackendError> {
        let actions: Vec<Value> = documents
            .into_iter()
            .map(|doc| {
                let mut value = doc.into_value();
                value["@search.action"] = json!(action);
                value
            })
            .collect();

        for batch in actions.chunks(PAGE_SIZE) {
            let res = self
                .send(
                    self.http
                        .post(self.docs_url("/index"))
                        .json(&json!({ "value": batch })),
                )
                .await?;
            let payload = expect_success(res).await?;

            let failed: Vec<String> = payload["value"]
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter(|item| item["status"] == json!(false))
                        .map(|item| {
                            format!(
                                "{}: {}",
                                item["key"].as_str().unwrap_or("?"),
                                item["errorMessage"].as_str().unwrap_or("unknown error")
                            )
                        })
                        .collect()
                })
                .unwrap_or_default();
            if !failed.is_empty() {
                return Err(BackendError::Upstream(format!(
                    "indexing rejected {} document(s): {}",
                    failed.len(),
                    failed.join("; ")
                )));
            }
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Document>, BackendError> {
        let url = self.docs_url(&format!("/{}", urlencoding::encode(key)));
        let res = self.send(self.http.get(url)).await?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let payload = expect_success(res).await?;
        Ok(Document::from_value(payload))
    }
}

async fn expect_success(res: reqwest::Response) -> Result<Value, BackendError> {
    let status = res.status();
    if !status.is_success() {
        let text = res.text().await.unwrap_or_default();
        return Err(BackendError::Upstream(format!(
            "Azure Search returned {}: {}",
            status, text
        )));
    }
    Ok(res.json().await?)
}

/// Keeps the message fields and exposes `@search.score` as `score`.
fn project_message(doc: &Document) -> Document {
    let mut projected = Document::new();
    for field in MESSAGE_FIELDS {
        if let Some(value) = doc.get(field) {
            projected.insert(field, value.clone());
        }
    }
    projected.insert("score", json!(doc.number("@search.score")));
    projected
}

fn sort_by_score_desc(records: &mut [Document]) {
    records.sort_by(|a, b| {
        b.number("score")
            .partial_cmp(&a.number("score"))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn render(records: Vec<Document>, format: MessageFormat) -> RenderedResult {
    match format {
        MessageFormat::Html => RenderedResult::Html(render_message_table(&records)),
        MessageFormat::Json => RenderedResult::Records(records),
    }
}

pub struct AzureBackend {
    endpoint: String,
    key: String,
    api_version: String,
    timeout: Duration,
    llm: Arc<dyn LanguageModel>,
    enricher: Arc<dyn DocumentEnricher>,
    client: RwLock<Option<Client>>,
}

impl AzureBackend {
    pub fn new(
        config: &AzureConfig,
        timeout: Duration,
        llm: Arc<dyn LanguageModel>,
        enricher: Arc<dyn DocumentEnricher>,
    ) -> Self {
        Self {
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_default()
                .trim_end_matches('/')
                .to_string(),
            key: config.key.clone().unwrap_or_default(),
            api_version: config.api_version.clone(),
            timeout,
            llm,
            enricher,
            client: RwLock::new(None),
        }
    }

    fn http(&self) -> Result<Client, BackendError> {
        self.client
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| {
                BackendError::Connection("Azure Search connection is not initialized".into())
            })
    }

    fn index_client(&self, index: &str) -> Result<IndexClient, BackendError> {
        let http = self.http()?;
        Ok(IndexClient {
            http,
            base: format!("{}/indexes/{}/docs", self.endpoint, index),
            key: self.key.clone(),
            api_version: self.api_version.clone(),
        })
    }

    async fn message_descriptions(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Document>, BackendError> {
        let embedding = self.llm.embed(query).await?;
        let client = self.index_client(MESSAGE_INDEX)?;
        let hits = client
            .search(json!({
                "select": MESSAGE_FIELDS.join(","),
                "top": limit,
                "vectorQueries": [{
                    "kind": "vector",
                    "vector": embedding,
                    "k": limit,
                    "fields": VECTOR_FIELD,
                }],
            }))
            .await?;

        let mut records: Vec<Document> = hits.iter().map(project_message).collect();
        sort_by_score_desc(&mut records);
        Ok(records)
    }

    async fn service_stats(&self) -> Result<Value, BackendError> {
        let http = self.http()?;
        let res = http
            .get(format!("{}/servicestats", self.endpoint))
            .header("api-key", &self.key)
            .query(&[("api-version", self.api_version.as_str())])
            .send()
            .await?;
        expect_success(res).await
    }

    async fn messages_since(&self, since: DateTime<Utc>) -> Result<Vec<Document>, BackendError> {
        let client = self.index_client(MESSAGE_INDEX)?;
        let filter = format!(
            "uploadDate ge {}",
            since.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        let hits = client
            .search_all(json!({
                "search": "*",
                "filter": filter,
                "select": MESSAGE_FIELDS.join(","),
            }))
            .await?;

        let mut records: Vec<Document> = hits.iter().map(project_message).collect();
        sort_by_score_desc(&mut records);
        Ok(records)
    }

    /// Fills a missing embedding, summary and tag, in that order.
    async fn enrich(&self, mut doc: Document) -> Result<Document, BackendError> {
        if !doc.contains(VECTOR_FIELD) {
            let source = if doc.is_blank("message") {
                doc.text("content")
            } else {
                doc.text("message")
            };
            let embedding = self.llm.embed(&source).await?;
            doc.insert(VECTOR_FIELD, json!(embedding));
        }
        if doc.is_blank("summary") {
            let summary = self.enricher.summarize_message(&doc.text("message")).await?;
            doc.insert("summary", summary);
        }
        if doc.is_blank("tag") {
            let tag = self.enricher.tag_summary(&doc.text("summary")).await?;
            doc.insert("tag", tag);
        }
        Ok(doc)
    }

    async fn upload(&self, collection: &str, documents: Vec<Document>) -> Result<bool, BackendError> {
        let client = self.index_client(collection)?;
        let mut enriched = Vec::with_capacity(documents.len());
        for doc in documents {
            enriched.push(self.enrich(doc).await?);
        }
        let total = enriched.len();
        client.index("upload", enriched).await?;
        tracing::info!("Uploaded {} documents to index {}", total, collection);
        Ok(true)
    }

    async fn delete_by_id(&self, collection: &str, document_id: &str) -> Result<bool, BackendError> {
        let client = self.index_client(collection)?;
        client
            .index("delete", vec![Document::new().with("id", document_id)])
            .await?;
        tracing::info!("Deleted document {} from index {}", document_id, collection);
        Ok(true)
    }

    async fn delete_all(&self, collection: &str) -> Result<bool, BackendError> {
        let client = self.index_client(collection)?;
        let ids: Vec<Document> = client
            .search_all(json!({ "search": "*", "select": "id" }))
            .await?
            .into_iter()
            .filter(|doc| !doc.is_blank("id"))
            .map(|doc| Document::new().with("id", doc.text("id")))
            .collect();

        if ids.is_empty() {
            tracing::info!("Index {} is already empty", collection);
            return Ok(true);
        }
        let total = ids.len();
        client.index("delete", ids).await?;
        tracing::info!("Deleted {} documents from index {}", total, collection);
        Ok(true)
    }

    /// Concurrent retags of one message race; the last write wins.
    async fn retag(&self, message_id: &str) -> Result<bool, BackendError> {
        let client = self.index_client(MESSAGE_INDEX)?;
        let Some(doc) = client.get(message_id).await? else {
            tracing::warn!("Message {} not found for retagging", message_id);
            return Ok(false);
        };

        let tag = self.enricher.tag_summary(&doc.text("summary")).await?;
        client
            .index(
                "mergeOrUpload",
                vec![Document::new().with("id", message_id).with("tag", tag)],
            )
            .await?;
        Ok(true)
    }

    async fn retag_all(&self) -> Result<bool, BackendError> {
        let client = self.index_client(MESSAGE_INDEX)?;
        let messages = client
            .search_all(json!({ "search": "*", "select": "id,summary" }))
            .await?;

        let mut updates = Vec::with_capacity(messages.len());
        for doc in messages.iter().filter(|doc| !doc.is_blank("id")) {
            let tag = self.enricher.tag_summary(&doc.text("summary")).await?;
            updates.push(Document::new().with("id", doc.text("id")).with("tag", tag));
        }

        if updates.is_empty() {
            return Ok(true);
        }
        let total = updates.len();
        client.index("mergeOrUpload", updates).await?;
        tracing::info!("Retagged {} messages", total);
        Ok(true)
    }
}

#[async_trait]
impl SearchBackend for AzureBackend {
    fn provider(&self) -> ProviderId {
        ProviderId::Azure
    }

    async fn initialize_connection(&self) -> Result<(), BackendError> {
        if self.endpoint.is_empty() || self.key.trim().is_empty() {
            return Err(BackendError::Connection(
                "Azure Search endpoint and key are required but not configured".into(),
            ));
        }

        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(BackendError::connection)?;
        *self.client.write().unwrap_or_else(|e| e.into_inner()) = Some(client);

        tracing::info!("Azure Search connection initialized successfully");
        Ok(())
    }

    async fn close_connection(&self) -> Result<(), BackendError> {
        let previous = self.client.write().unwrap_or_else(|e| e.into_inner()).take();
        if previous.is_some() {
            tracing::info!("Azure Search connection closed");
        }
        Ok(())
    }

    /// Reads service statistics, which needs no index to exist.
    async fn health_check(&self) -> bool {
        match self.service_stats().await {
            Ok(_) => true,
            Err(err) => {
                tracing::error!("Azure Search health check failed: {}", err);
                false
            }
        }
    }

    async fn get_visitor_evidence_context(&self, _query: &str, _limit: usize) -> Vec<Document> {
        unsupported(self.provider(), "get_visitor_evidence_context")
    }

    async fn get_policy_assertions(&self, _query: &str, _limit: usize) -> Vec<Document> {
        unsupported(self.provider(), "get_policy_assertions")
    }

    async fn get_blog_assertions(&self, _query: &str, _limit: usize) -> Vec<Document> {
        unsupported(self.provider(), "get_blog_assertions")
    }

    async fn get_message_descriptions(&self, query: &str, limit: usize) -> RenderedResult {
        let records = or_empty(
            "get_message_descriptions",
            self.message_descriptions(query, limit).await,
        );
        RenderedResult::Html(render_message_table(&records))
    }

    async fn search_messages(&self, query: &str, limit: usize) -> Vec<Document> {
        or_empty("search_messages", self.message_descriptions(query, limit).await)
    }

    async fn get_messages_since(
        &self,
        since: DateTime<Utc>,
        format: MessageFormat,
    ) -> RenderedResult {
        let result = self
            .messages_since(since)
            .await
            .map(|records| render(records, format));
        or_else_report("get_messages_since", result, || render(Vec::new(), format))
    }

    async fn upload_documents(&self, collection: &str, documents: Vec<Document>) -> bool {
        if documents.is_empty() {
            tracing::warn!("No documents provided for upload");
            return false;
        }
        or_empty("upload_documents", self.upload(collection, documents).await)
    }

    async fn delete_document_by_id(&self, collection: &str, document_id: &str) -> bool {
        or_empty(
            "delete_document_by_id",
            self.delete_by_id(collection, document_id).await,
        )
    }

    async fn delete_all_documents(&self, collection: &str) -> bool {
        or_empty("delete_all_documents", self.delete_all(collection).await)
    }

    async fn retag_message(&self, message_id: &str) -> bool {
        or_empty("retag_message", self.retag(message_id).await)
    }

    async fn retag_all_messages(&self) -> bool {
        or_empty("retag_all_messages", self.retag_all().await)
    }
}
