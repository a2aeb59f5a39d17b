use std::sync::{Arc, RwLock};

use super::contract::{ProviderId, SearchBackend};
use super::document::Document;
use super::registry::BackendRegistry;
use crate::core::errors::BackendError;

/// Single entry point for retrieval that forwards to the active backend.
///
/// The facade holds its own snapshot of the registry handle and only
/// replaces it through [`SearchFacade::switch_provider`].
pub struct SearchFacade {
    registry: Arc<BackendRegistry>,
    backend: RwLock<Arc<dyn SearchBackend>>,
}

impl SearchFacade {
    pub async fn new(
        registry: Arc<BackendRegistry>,
        provider: Option<ProviderId>,
    ) -> Result<Self, BackendError> {
        let backend = registry.get_service(provider).await?;
        Ok(Self {
            registry,
            backend: RwLock::new(backend),
        })
    }

    pub fn backend(&self) -> Arc<dyn SearchBackend> {
        self.backend
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn current_provider(&self) -> ProviderId {
        self.backend().provider()
    }

    pub async fn health_check(&self) -> bool {
        self.backend().health_check().await
    }

    pub async fn get_visitor_evidence_context(&self, query: &str, limit: usize) -> Vec<Document> {
        self.backend()
            .get_visitor_evidence_context(query, limit)
            .await
    }

    pub async fn get_policy_assertions(&self, query: &str, limit: usize) -> Vec<Document> {
        self.backend().get_policy_assertions(query, limit).await
    }

    pub async fn get_blog_assertions(&self, query: &str, limit: usize) -> Vec<Document> {
        self.backend().get_blog_assertions(query, limit).await
    }

    pub async fn switch_provider(&self, provider: ProviderId) -> Result<(), BackendError> {
        let backend = self.registry.switch_provider(provider).await?;
        *self.backend.write().unwrap_or_else(|e| e.into_inner()) = backend;
        tracing::info!("Search facade now routes to {}", provider);
        Ok(())
    }
}
