use thiserror::Error;

use crate::core::config::ConfigError;
use crate::core::errors::BackendError;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to initialize LLM client: {0}")]
    Llm(#[source] BackendError),

    #[error("Failed to initialize search backend: {0}")]
    Search(#[source] BackendError),

    #[error("Failed to initialize graph store: {0}")]
    Graph(#[source] BackendError),
}
