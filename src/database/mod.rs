pub mod astra;
pub mod azure;
pub mod contract;
pub mod document;
pub mod facade;
pub mod registry;
pub mod table;

pub use astra::AstraBackend;
pub use azure::AzureBackend;
pub use contract::{
    degrade, or_else_report, or_empty, unsupported, Degradation, DocumentEnricher, MessageFormat,
    ProviderId, RenderedResult, SearchBackend, DEFAULT_BLOG_LIMIT, DEFAULT_MESSAGE_LIMIT,
    DEFAULT_POLICY_LIMIT, DEFAULT_VISITOR_LIMIT,
};
pub use document::Document;
pub use facade::SearchFacade;
pub use registry::{BackendFactory, BackendRegistry, HttpBackendFactory};
