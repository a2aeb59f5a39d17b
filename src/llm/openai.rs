use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::config::LlmConfig;
use crate::core::errors::BackendError;
use super::provider::LanguageModel;
use super::types::ChatRequest;

/// OpenAI-compatible client for `/v1/chat/completions` and `/v1/embeddings`.
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: Option<String>,
    chat_model: String,
    embedding_model: String,
    client: Client,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Result<Self, BackendError> {
        if config.api_key.as_deref().map(str::trim).unwrap_or("").is_empty() {
            tracing::warn!("OPENAI_API_KEY is not set; completion and embedding calls will fail");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(BackendError::connection)?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            client,
        })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.post(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, BackendError> {
        let body = json!({
            "model": self.embedding_model,
            "input": [text],
        });

        let res = self.post("/v1/embeddings").json(&body).send().await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(BackendError::Upstream(format!(
                "embedding request failed ({}): {}",
                status, text
            )));
        }

        let payload: EmbeddingResponse = res.json().await?;
        payload
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| BackendError::Upstream("embedding response had no data".to_string()))
    }

    async fn complete(&self, request: ChatRequest) -> Result<String, BackendError> {
        let body = json!({
            "model": self.chat_model,
            "messages": request.messages,
        });

        let res = self.post("/v1/chat/completions").json(&body).send().await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(BackendError::Upstream(format!(
                "completion request failed ({}): {}",
                status, text
            )));
        }

        let payload: Value = res.json().await?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| BackendError::Upstream("completion response had no content".to_string()))
    }
}
