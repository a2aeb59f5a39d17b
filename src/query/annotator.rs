use std::sync::Arc;

use async_trait::async_trait;

use crate::core::errors::BackendError;
use crate::database::DocumentEnricher;
use crate::llm::{ChatRequest, LanguageModel};
use super::prompts;

/// Derives summaries and tags for messages with one completion each.
pub struct MessageAnnotator {
    llm: Arc<dyn LanguageModel>,
}

impl MessageAnnotator {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl DocumentEnricher for MessageAnnotator {
    async fn summarize_message(&self, message: &str) -> Result<String, BackendError> {
        self.llm
            .complete(ChatRequest::single(prompts::summarize_message(message)))
            .await
    }

    async fn tag_summary(&self, summary: &str) -> Result<String, BackendError> {
        self.llm
            .complete(ChatRequest::single(prompts::tag_summary(summary)))
            .await
    }
}
