use serde_json::{Map, Value};

use super::service::{is_present, AppConfig, ConfigError};

/// Structural checks on the merged YAML before it is deserialized.
pub fn validate_config(config: &Value) -> Result<(), ConfigError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65_535)?;
    }

    if let Some(llm) = expect_optional_object(root, "llm")? {
        validate_optional_string_field(llm, "llm.base_url", "base_url")?;
        validate_optional_string_field(llm, "llm.chat_model", "chat_model")?;
        validate_optional_string_field(llm, "llm.embedding_model", "embedding_model")?;
        validate_u64_field(llm, "llm.timeout_secs", "timeout_secs", 1, 600)?;
    }

    if let Some(database) = expect_optional_object(root, "database")? {
        validate_optional_string_field(database, "database.provider", "provider")?;
        validate_u64_field(database, "database.timeout_secs", "timeout_secs", 1, 600)?;
        if let Some(astra) = expect_optional_object(database, "astra")? {
            validate_optional_string_field(astra, "database.astra.endpoint", "endpoint")?;
            validate_optional_string_field(astra, "database.astra.keyspace", "keyspace")?;
        }
        if let Some(azure) = expect_optional_object(database, "azure")? {
            validate_optional_string_field(azure, "database.azure.endpoint", "endpoint")?;
            validate_optional_string_field(azure, "database.azure.api_version", "api_version")?;
        }
    }

    if let Some(graph) = expect_optional_object(root, "graph")? {
        validate_optional_string_field(graph, "graph.url", "url")?;
        validate_optional_string_field(graph, "graph.user", "user")?;
    }

    Ok(())
}

/// Names every environment variable the selected provider still needs.
pub fn missing_requirements(config: &AppConfig) -> Vec<String> {
    let mut missing = Vec::new();

    if !is_present(&config.llm.api_key) {
        missing.push("OPENAI_API_KEY".to_string());
    }

    match config.database.provider.as_str() {
        "astra" => {
            if !is_present(&config.database.astra.token) {
                missing.push("ASTRADB_TOKEN".to_string());
            }
            if !is_present(&config.database.astra.endpoint) {
                missing.push("ASTRADB_ENDPOINT".to_string());
            }
        }
        "azure" => {
            if !is_present(&config.database.azure.endpoint) {
                missing.push("AZURE_SEARCH_ENDPOINT".to_string());
            }
            if !is_present(&config.database.azure.key) {
                missing.push("AZURE_SEARCH_KEY".to_string());
            }
        }
        other => missing.push(format!("Unknown DATABASE_PROVIDER: {}", other)),
    }

    missing
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ConfigError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(config_type_error(key, "object")),
    }
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    match section.get(key) {
        None | Some(Value::Null) | Some(Value::String(_)) => Ok(()),
        Some(_) => Err(config_type_error(path, "string")),
    }
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ConfigError::Invalid {
            path: path.to_string(),
            message: format!("must be between {} and {}", min, max),
        });
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ConfigError {
    ConfigError::Invalid {
        path: path.to_string(),
        message: format!("expected {}", expected),
    }
}
