//! Backend registry: resolves the active provider and hands out a shared handle.
//!
//! The first caller constructs the backend; later callers receive the same
//! `Arc`. Switching providers installs the new handle before closing the old
//! one, and calls already holding the old handle run to completion on it.
//!
//! Message maintenance is only served by the indexed-search backend, so the
//! registry also caches a separate Azure handle for it. That handle does not
//! follow provider switches.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::core::config::DatabaseConfig;
use crate::core::errors::BackendError;
use crate::llm::LanguageModel;
use super::astra::AstraBackend;
use super::azure::AzureBackend;
use super::contract::{DocumentEnricher, ProviderId, SearchBackend};

/// Builds connected backends for the registry.
#[async_trait]
pub trait BackendFactory: Send + Sync {
    /// Picks a provider when the caller names none.
    fn detect(&self) -> Result<ProviderId, BackendError>;

    /// Constructs and connects a backend for `provider`.
    async fn create(&self, provider: ProviderId) -> Result<Arc<dyn SearchBackend>, BackendError>;
}

pub struct HttpBackendFactory {
    config: DatabaseConfig,
    llm: Arc<dyn LanguageModel>,
    enricher: Arc<dyn DocumentEnricher>,
}

impl HttpBackendFactory {
    pub fn new(
        config: DatabaseConfig,
        llm: Arc<dyn LanguageModel>,
        enricher: Arc<dyn DocumentEnricher>,
    ) -> Self {
        Self {
            config,
            llm,
            enricher,
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }
}

#[async_trait]
impl BackendFactory for HttpBackendFactory {
    /// Astra credentials win over Azure credentials; with neither present the
    /// configured default provider is used.
    fn detect(&self) -> Result<ProviderId, BackendError> {
        if self.config.astra.has_credentials() {
            return Ok(ProviderId::Astra);
        }
        if self.config.azure.has_credentials() {
            return Ok(ProviderId::Azure);
        }
        self.config.provider.parse()
    }

    async fn create(&self, provider: ProviderId) -> Result<Arc<dyn SearchBackend>, BackendError> {
        let backend: Arc<dyn SearchBackend> = match provider {
            ProviderId::Astra => {
                if !self.config.astra.has_credentials() {
                    return Err(BackendError::ProviderResolution(
                        "astra requires ASTRADB_TOKEN and ASTRADB_ENDPOINT".into(),
                    ));
                }
                Arc::new(AstraBackend::new(
                    &self.config.astra,
                    self.timeout(),
                    self.llm.clone(),
                ))
            }
            ProviderId::Azure => {
                if !self.config.azure.has_credentials() {
                    return Err(BackendError::ProviderResolution(
                        "azure requires AZURE_SEARCH_ENDPOINT and AZURE_SEARCH_KEY".into(),
                    ));
                }
                Arc::new(AzureBackend::new(
                    &self.config.azure,
                    self.timeout(),
                    self.llm.clone(),
                    self.enricher.clone(),
                ))
            }
        };

        backend.initialize_connection().await?;
        Ok(backend)
    }
}

pub struct BackendRegistry {
    factory: Arc<dyn BackendFactory>,
    current: Mutex<Option<Arc<dyn SearchBackend>>>,
    messages: Mutex<Option<Arc<dyn SearchBackend>>>,
}

impl BackendRegistry {
    pub fn new(factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            factory,
            current: Mutex::new(None),
            messages: Mutex::new(None),
        }
    }

    /// Returns the live handle, constructing it on first use.
    ///
    /// `provider` only matters for that first construction; once a handle is
    /// cached it is returned unchanged. Use [`switch_provider`](Self::switch_provider)
    /// to change backends.
    pub async fn get_service(
        &self,
        provider: Option<ProviderId>,
    ) -> Result<Arc<dyn SearchBackend>, BackendError> {
        let mut current = self.current.lock().await;
        if let Some(existing) = current.as_ref() {
            return Ok(existing.clone());
        }

        let provider = match provider {
            Some(provider) => provider,
            None => self.factory.detect()?,
        };
        let created = self.factory.create(provider).await?;
        tracing::info!("Initialized {} search backend", provider);

        *current = Some(created.clone());
        Ok(created)
    }

    /// Replaces the live handle with one for `provider`.
    ///
    /// The old handle stays live if the new one cannot be constructed.
    pub async fn switch_provider(
        &self,
        provider: ProviderId,
    ) -> Result<Arc<dyn SearchBackend>, BackendError> {
        let mut current = self.current.lock().await;

        let created = self.factory.create(provider).await?;
        let previous = current.replace(created.clone());
        drop(current);

        if let Some(previous) = previous {
            tracing::info!("Switching search backend from {} to {}", previous.provider(), provider);
            close_quietly(previous).await;
        } else {
            tracing::info!("Initialized {} search backend", provider);
        }
        Ok(created)
    }

    pub async fn current_provider(&self) -> Option<ProviderId> {
        self.current.lock().await.as_ref().map(|b| b.provider())
    }

    /// Returns the Azure handle used for message routes, constructing it once.
    pub async fn message_service(&self) -> Result<Arc<dyn SearchBackend>, BackendError> {
        let mut messages = self.messages.lock().await;
        if let Some(existing) = messages.as_ref() {
            return Ok(existing.clone());
        }

        let created = self.factory.create(ProviderId::Azure).await?;
        tracing::info!("Initialized azure message backend");

        *messages = Some(created.clone());
        Ok(created)
    }

    /// Health of every provider, in [`ProviderId::ALL`] order.
    ///
    /// A provider that cannot be constructed counts as unhealthy.
    pub async fn health_report(&self) -> Vec<(ProviderId, bool)> {
        let mut report = Vec::with_capacity(ProviderId::ALL.len());
        for provider in ProviderId::ALL {
            report.push((provider, self.provider_healthy(provider).await));
        }
        report
    }

    async fn provider_healthy(&self, provider: ProviderId) -> bool {
        let live = self
            .current
            .lock()
            .await
            .clone()
            .filter(|backend| backend.provider() == provider);
        if let Some(backend) = live {
            return backend.health_check().await;
        }

        if provider == ProviderId::Azure {
            return match self.message_service().await {
                Ok(backend) => backend.health_check().await,
                Err(err) => {
                    tracing::warn!("{} backend unavailable for health check: {}", provider, err);
                    false
                }
            };
        }

        match self.factory.create(provider).await {
            Ok(backend) => {
                let healthy = backend.health_check().await;
                close_quietly(backend).await;
                healthy
            }
            Err(err) => {
                tracing::warn!("{} backend unavailable for health check: {}", provider, err);
                false
            }
        }
    }

    /// Drops the cached handles so the next call re-resolves.
    pub async fn reset(&self) {
        let previous = self.current.lock().await.take();
        if let Some(previous) = previous {
            close_quietly(previous).await;
        }
        let messages = self.messages.lock().await.take();
        if let Some(messages) = messages {
            close_quietly(messages).await;
        }
    }
}

async fn close_quietly(backend: Arc<dyn SearchBackend>) {
    if let Err(err) = backend.close_connection().await {
        tracing::warn!("Failed to close {} backend: {}", backend.provider(), err);
    }
}
