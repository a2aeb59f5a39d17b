pub mod paths;
pub mod service;
pub mod validation;

pub use paths::AppPaths;
pub use service::{
    AppConfig, AstraConfig, AzureConfig, ConfigError, ConfigService, DatabaseConfig, GraphConfig,
    LlmConfig, ServerConfig,
};
pub use validation::missing_requirements;
