use std::sync::Arc;
use std::time::Duration;

use crate::core::config::{AppConfig, AppPaths};
use crate::database::{BackendFactory, BackendRegistry, HttpBackendFactory, SearchFacade};
use crate::llm::{LanguageModel, OpenAiClient};
use crate::query::{MessageAnnotator, QueryService};
use crate::relations::{Neo4jStore, RelationshipStore};

pub mod error;

use error::InitializationError;

/// Shared application state handed to every route.
///
/// The registry is owned here and passed by handle to the facade and the
/// query service; there is no process-global backend.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: AppConfig,
    pub llm: Arc<dyn LanguageModel>,
    pub registry: Arc<BackendRegistry>,
    pub search: Arc<SearchFacade>,
    pub queries: Arc<QueryService>,
}

impl AppState {
    /// Builds the production graph: OpenAI client, HTTP backends, optional Neo4j.
    ///
    /// Fails when no search provider can be resolved or connected.
    pub async fn initialize(
        paths: Arc<AppPaths>,
        config: AppConfig,
    ) -> Result<Arc<Self>, InitializationError> {
        let llm: Arc<dyn LanguageModel> =
            Arc::new(OpenAiClient::new(&config.llm).map_err(InitializationError::Llm)?);
        let annotator = Arc::new(MessageAnnotator::new(llm.clone()));
        let factory = Arc::new(HttpBackendFactory::new(
            config.database.clone(),
            llm.clone(),
            annotator,
        ));

        let graph = Neo4jStore::from_config(
            &config.graph,
            Duration::from_secs(config.database.timeout_secs),
        )
        .map_err(InitializationError::Graph)?
        .map(|store| Arc::new(store) as Arc<dyn RelationshipStore>);
        if graph.is_none() {
            tracing::info!("NEO4JURL not set; graph context disabled");
        }

        Self::assemble(paths, config, llm, factory, graph).await
    }

    /// Wires the registry, facade and query service around the given collaborators.
    pub async fn assemble(
        paths: Arc<AppPaths>,
        config: AppConfig,
        llm: Arc<dyn LanguageModel>,
        factory: Arc<dyn BackendFactory>,
        graph: Option<Arc<dyn RelationshipStore>>,
    ) -> Result<Arc<Self>, InitializationError> {
        let registry = Arc::new(BackendRegistry::new(factory));
        let search = Arc::new(
            SearchFacade::new(registry.clone(), None)
                .await
                .map_err(InitializationError::Search)?,
        );
        tracing::info!("Search backend ready: {}", search.current_provider());

        let annotator = Arc::new(MessageAnnotator::new(llm.clone()));
        let queries = Arc::new(QueryService::new(
            search.clone(),
            llm.clone(),
            annotator,
            graph,
        ));

        Ok(Arc::new(Self {
            paths,
            config,
            llm,
            registry,
            search,
            queries,
        }))
    }
}
