use async_trait::async_trait;

use crate::core::errors::BackendError;
use super::types::ChatRequest;

/// Embedding and completion capability consumed by the adapters and the
/// query orchestrator.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// return the provider name (e.g. "openai")
    fn name(&self) -> &str;

    /// embed one piece of text into the model's fixed-dimension vector space
    async fn embed(&self, text: &str) -> Result<Vec<f32>, BackendError>;

    /// chat completion (non-streaming)
    async fn complete(&self, request: ChatRequest) -> Result<String, BackendError>;
}
