use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::paths::AppPaths;
use super::validation::validate_config;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 8] = [
    "api_key",
    "key",
    "secret",
    "password",
    "token",
    "credential",
    "auth_",
    "bearer",
];

const SENSITIVE_WHITELIST: [&str; 1] = ["keyspace"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid config at '{path}': {message}")]
    Invalid { path: String, message: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub database: DatabaseConfig,
    pub graph: GraphConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser origins allowed by CORS; empty means the local defaults.
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            chat_model: "gpt-4o".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Provider selection plus credentials for every supported retrieval backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Fallback provider used when no credentials are detected.
    pub provider: String,
    pub timeout_secs: u64,
    pub astra: AstraConfig,
    pub azure: AzureConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            provider: "astra".to_string(),
            timeout_secs: 30,
            astra: AstraConfig::default(),
            azure: AzureConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AstraConfig {
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub keyspace: String,
}

impl Default for AstraConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token: None,
            keyspace: "default_keyspace".to_string(),
        }
    }
}

impl AstraConfig {
    pub fn has_credentials(&self) -> bool {
        is_present(&self.token) && is_present(&self.endpoint)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    pub endpoint: Option<String>,
    pub key: Option<String>,
    pub api_version: String,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            key: None,
            api_version: "2023-11-01".to_string(),
        }
    }
}

impl AzureConfig {
    pub fn has_credentials(&self) -> bool {
        is_present(&self.endpoint) && is_present(&self.key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub url: Option<String>,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
    /// OpenAI key handed to `genai.vector.encode` inside the graph query.
    pub embedding_token: Option<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            url: None,
            user: "neo4j".to_string(),
            password: None,
            database: "neo4j".to_string(),
            embedding_token: None,
        }
    }
}

pub(crate) fn is_present(value: &Option<String>) -> bool {
    value.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
}

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("EVIDENCE_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.user_data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.user_data_dir.join("secrets.yaml")
    }

    /// Loads `config.yml`, overlays `secrets.yaml`, then the process environment.
    pub fn load_config(&self) -> Result<AppConfig, ConfigError> {
        let public_config = load_yaml_file(&self.config_path())?;
        let secrets_config = load_yaml_file(&self.secrets_path())?;
        let merged = deep_merge(&public_config, &secrets_config);
        validate_config(&merged)?;

        let mut config: AppConfig =
            serde_json::from_value(merged).map_err(|e| ConfigError::Invalid {
                path: "root".to_string(),
                message: e.to_string(),
            })?;
        apply_env_overrides(&mut config, |name| env::var(name).ok());
        Ok(config)
    }

    pub fn redact_sensitive_values(&self, config: &AppConfig) -> Value {
        let value = serde_json::to_value(config).unwrap_or(Value::Null);
        redact_sensitive_values(&value)
    }
}

/// Applies the environment variables the deployment scripts export.
///
/// Empty values are ignored so an exported-but-blank variable never masks the file.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("HOST") {
        config.server.host = v;
    }
    if let Some(port) = get("PORT").and_then(|v| v.parse::<u16>().ok()) {
        config.server.port = port;
    }

    if let Some(v) = get("OPENAI_API_KEY") {
        config.llm.api_key = Some(v);
    }
    if let Some(v) = get("OPENAI_BASE_URL") {
        config.llm.base_url = v;
    }

    if let Some(v) = get("DATABASE_PROVIDER") {
        config.database.provider = v.to_lowercase();
    }
    if let Some(v) = get("ASTRADB_TOKEN") {
        config.database.astra.token = Some(v);
    }
    if let Some(v) = get("ASTRADB_ENDPOINT") {
        config.database.astra.endpoint = Some(v);
    }
    if let Some(v) = get("ASTRADB_KEYSPACE") {
        config.database.astra.keyspace = v;
    }
    if let Some(v) = get("AZURE_SEARCH_ENDPOINT") {
        config.database.azure.endpoint = Some(v);
    }
    if let Some(v) = get("AZURE_SEARCH_KEY") {
        config.database.azure.key = Some(v);
    }
    if let Some(v) = get("AZURE_SEARCH_API_VERSION") {
        config.database.azure.api_version = v;
    }

    if let Some(v) = get("NEO4JURL") {
        config.graph.url = Some(v);
    }
    if let Some(v) = get("NEO4JPASSWORD") {
        config.graph.password = Some(v);
    }
    if let Some(v) = get("NEO4J_OPENAI_TOKEN") {
        config.graph.embedding_token = Some(v);
    }
}

fn load_yaml_file(path: &Path) -> Result<Value, ConfigError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let value = serde_yaml::from_str::<Value>(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Object(_) => Ok(value),
        _ => Ok(Value::Object(Map::new())),
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() && !val.is_object() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn deep_merge_overlays_secrets_on_public_config() {
        let base = json!({
            "database": { "provider": "azure", "azure": { "endpoint": "https://x" } }
        });
        let secrets = json!({
            "database": { "azure": { "key": "k" } }
        });

        let merged = deep_merge(&base, &secrets);

        assert_eq!(
            merged,
            json!({
                "database": {
                    "provider": "azure",
                    "azure": { "endpoint": "https://x", "key": "k" }
                }
            })
        );
    }

    #[test]
    fn env_overrides_fill_credentials_and_skip_blank_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("ASTRADB_TOKEN", "tok"),
            ("ASTRADB_ENDPOINT", "https://astra.example"),
            ("AZURE_SEARCH_KEY", "  "),
            ("DATABASE_PROVIDER", "AZURE"),
            ("PORT", "9001"),
        ]);
        let mut config = AppConfig::default();

        apply_env_overrides(&mut config, |name| vars.get(name).map(|v| v.to_string()));

        assert!(config.database.astra.has_credentials());
        assert!(!config.database.azure.has_credentials());
        assert_eq!(config.database.provider, "azure");
        assert_eq!(config.database.astra.keyspace, "default_keyspace");
        assert_eq!(config.server.port, 9001);
    }

    #[test]
    fn load_config_reads_yaml_and_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Arc::new(AppPaths::with_dirs(
            dir.path().to_path_buf(),
            dir.path().to_path_buf(),
        ));
        fs::write(
            dir.path().join("config.yml"),
            "llm:\n  chat_model: gpt-4o-mini\ndatabase:\n  timeout_secs: 5\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("secrets.yaml"),
            "graph:\n  password: hunter2\n",
        )
        .unwrap();
        let service = ConfigService::new(paths);

        let config = service.load_config().unwrap();

        assert_eq!(config.llm.chat_model, "gpt-4o-mini");
        assert_eq!(config.llm.embedding_model, "text-embedding-ada-002");
        assert_eq!(config.database.timeout_secs, 5);
        assert_eq!(config.graph.password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn redaction_hides_secrets_but_keeps_keyspace() {
        let paths = Arc::new(AppPaths::with_dirs(
            std::env::temp_dir(),
            std::env::temp_dir(),
        ));
        let service = ConfigService::new(paths);
        let mut config = AppConfig::default();
        config.database.azure.key = Some("secret".to_string());
        config.llm.api_key = Some("sk-123".to_string());

        let redacted = service.redact_sensitive_values(&config);

        assert_eq!(redacted["database"]["azure"]["key"], json!("****"));
        assert_eq!(redacted["llm"]["api_key"], json!("****"));
        assert_eq!(redacted["database"]["astra"]["keyspace"], json!("default_keyspace"));
        assert_eq!(redacted["database"]["astra"]["token"], Value::Null);
    }
}
