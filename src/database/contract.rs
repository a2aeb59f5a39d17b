//! The capability contract every retrieval backend implements.
//!
//! Capability is partial per backend: an operation a backend cannot serve
//! returns an empty result (or `false`) and logs a warning, so a caller
//! iterating over backends never fails on one that lacks an operation.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::BackendError;
use super::document::Document;

pub const DEFAULT_VISITOR_LIMIT: usize = 5;
pub const DEFAULT_POLICY_LIMIT: usize = 8;
pub const DEFAULT_BLOG_LIMIT: usize = 18;
pub const DEFAULT_MESSAGE_LIMIT: usize = 10;

/// Which adapter the registry constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Astra,
    Azure,
}

impl ProviderId {
    pub const ALL: [ProviderId; 2] = [ProviderId::Astra, ProviderId::Azure];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Astra => "astra",
            ProviderId::Azure => "azure",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "astra" => Ok(ProviderId::Astra),
            "azure" => Ok(ProviderId::Azure),
            other => Err(BackendError::ProviderResolution(format!(
                "Unsupported database provider: {}. Supported providers: astra, azure",
                other
            ))),
        }
    }
}

/// Requested output shape for message listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageFormat {
    #[default]
    Html,
    Json,
}

impl FromStr for MessageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "html" => Ok(MessageFormat::Html),
            "json" => Ok(MessageFormat::Json),
            _ => Err("Invalid format specified. Use 'html' or 'json'.".to_string()),
        }
    }
}

/// Either rendered markup or the raw records, depending on the request.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedResult {
    Html(String),
    Records(Vec<Document>),
}

impl Default for RenderedResult {
    fn default() -> Self {
        RenderedResult::Records(Vec::new())
    }
}

impl RenderedResult {
    pub fn into_json(self) -> Value {
        match self {
            RenderedResult::Html(html) => Value::String(html),
            RenderedResult::Records(records) => {
                Value::Array(records.into_iter().map(Document::into_value).collect())
            }
        }
    }
}

/// Derives missing summary and tag fields before a document is indexed.
#[async_trait]
pub trait DocumentEnricher: Send + Sync {
    async fn summarize_message(&self, message: &str) -> Result<String, BackendError>;

    async fn tag_summary(&self, summary: &str) -> Result<String, BackendError>;
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    fn provider(&self) -> ProviderId;

    /// Establish the connection; fails with `BackendError::Connection`.
    async fn initialize_connection(&self) -> Result<(), BackendError>;

    /// Release resources. Idempotent.
    async fn close_connection(&self) -> Result<(), BackendError>;

    /// Lightweight round-trip. Never propagates failures.
    async fn health_check(&self) -> bool;

    async fn get_visitor_evidence_context(&self, query: &str, limit: usize) -> Vec<Document>;

    async fn get_policy_assertions(&self, query: &str, limit: usize) -> Vec<Document>;

    async fn get_blog_assertions(&self, query: &str, limit: usize) -> Vec<Document>;

    /// Vector search over stored messages, rendered as the message table.
    async fn get_message_descriptions(&self, query: &str, limit: usize) -> RenderedResult;

    /// The same nearest-neighbour search as records, best match first.
    async fn search_messages(&self, _query: &str, _limit: usize) -> Vec<Document> {
        unsupported(self.provider(), "search_messages")
    }

    async fn get_messages_since(
        &self,
        since: DateTime<Utc>,
        format: MessageFormat,
    ) -> RenderedResult;

    async fn upload_documents(&self, collection: &str, documents: Vec<Document>) -> bool;

    async fn delete_document_by_id(&self, collection: &str, document_id: &str) -> bool;

    async fn delete_all_documents(&self, _collection: &str) -> bool {
        unsupported(self.provider(), "delete_all_documents")
    }

    async fn retag_message(&self, _message_id: &str) -> bool {
        unsupported(self.provider(), "retag_message")
    }

    async fn retag_all_messages(&self) -> bool {
        unsupported(self.provider(), "retag_all_messages")
    }
}

/// A failure that was absorbed into an empty result.
#[derive(Debug)]
pub struct Degradation {
    pub operation: &'static str,
    pub error: BackendError,
}

impl Degradation {
    pub fn report(&self) {
        match &self.error {
            BackendError::Unsupported { provider, .. } => {
                tracing::warn!(
                    provider = %provider,
                    operation = self.operation,
                    "operation not implemented by this backend"
                );
            }
            err => {
                tracing::error!(
                    operation = self.operation,
                    error = %err,
                    "backend call failed; returning empty result"
                );
            }
        }
    }
}

/// Splits a fallible outcome into the value to return and the failure to report.
pub fn degrade<T, F>(
    operation: &'static str,
    result: Result<T, BackendError>,
    fallback: F,
) -> (T, Option<Degradation>)
where
    F: FnOnce() -> T,
{
    match result {
        Ok(value) => (value, None),
        Err(error) => (fallback(), Some(Degradation { operation, error })),
    }
}

pub fn or_else_report<T, F>(operation: &'static str, result: Result<T, BackendError>, fallback: F) -> T
where
    F: FnOnce() -> T,
{
    let (value, degradation) = degrade(operation, result, fallback);
    if let Some(degradation) = degradation {
        degradation.report();
    }
    value
}

/// Converts a failure to the type's zero value after logging it.
pub fn or_empty<T: Default>(operation: &'static str, result: Result<T, BackendError>) -> T {
    or_else_report(operation, result, T::default)
}

pub fn unsupported<T: Default>(provider: ProviderId, operation: &'static str) -> T {
    or_empty(
        operation,
        Err(BackendError::Unsupported {
            provider: provider.as_str(),
            operation,
        }),
    )
}
