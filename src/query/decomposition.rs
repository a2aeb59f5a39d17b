use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::errors::BackendError;

#[derive(Debug, Deserialize)]
struct Component {
    component: String,
}

fn component_schema() -> Value {
    json!({
        "type": "array",
        "minItems": 1,
        "items": {
            "type": "object",
            "properties": {
                "component": { "type": "string", "minLength": 1 }
            },
            "required": ["component"],
            "additionalProperties": false
        }
    })
}

fn fence_regex() -> &'static Regex {
    static FENCE_REGEX: OnceLock<Regex> = OnceLock::new();
    FENCE_REGEX.get_or_init(|| {
        Regex::new(r"(?s)^```[A-Za-z]*\s*(.*?)\s*```$").expect("Invalid fence regex")
    })
}

/// Strips a surrounding ```json fence if the model added one.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    match fence_regex().captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => trimmed,
    }
}

/// Parses a decomposition reply into component strings.
///
/// Anything other than a non-empty JSON array of `{"component": "..."}`
/// objects is a `MalformedDecomposition` error.
pub fn parse_components(raw: &str) -> Result<Vec<String>, BackendError> {
    let body = strip_code_fence(raw);
    let instance: Value = serde_json::from_str(body).map_err(|e| {
        BackendError::MalformedDecomposition(format!("reply is not JSON: {}", e))
    })?;

    let schema = component_schema();
    let validator = jsonschema::validator_for(&schema)
        .map_err(|e| BackendError::MalformedDecomposition(format!("invalid schema: {}", e)))?;
    if let Err(err) = validator.validate(&instance) {
        return Err(BackendError::MalformedDecomposition(err.to_string()));
    }

    let components: Vec<Component> = serde_json::from_value(instance)
        .map_err(|e| BackendError::MalformedDecomposition(e.to_string()))?;

    let components: Vec<String> = components
        .into_iter()
        .map(|c| c.component.trim().to_string())
        .collect();
    if components.iter().any(String::is_empty) {
        return Err(BackendError::MalformedDecomposition(
            "component text is blank".into(),
        ));
    }
    Ok(components)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_fenced_arrays() {
        let plain = r#"[{"component": "peatland restoration"}, {"component": "funding"}]"#;
        let fenced = "```json\n[{\"component\": \"beavers\"}]\n```";

        assert_eq!(
            parse_components(plain).unwrap(),
            vec!["peatland restoration".to_string(), "funding".to_string()]
        );
        assert_eq!(parse_components(fenced).unwrap(), vec!["beavers".to_string()]);
    }

    #[test]
    fn prose_and_wrong_shapes_are_malformed() {
        for reply in [
            "Here are the components: funding, peat",
            "[]",
            r#"{"component": "x"}"#,
            r#"[{"name": "x"}]"#,
            r#"[{"component": 3}]"#,
            r#"[{"component": "   "}]"#,
            r#"[{"component": "x", "extra": true}]"#,
        ] {
            assert!(
                matches!(
                    parse_components(reply),
                    Err(BackendError::MalformedDecomposition(_))
                ),
                "accepted: {}",
                reply
            );
        }
    }

    #[test]
    fn fence_pattern_is_compiled_once() {
        let first = fence_regex() as *const Regex;
        parse_components("```\n[{\"component\": \"otters\"}]\n```").unwrap();
        assert!(std::ptr::eq(first, fence_regex()));
        assert_eq!(strip_code_fence("```text\nbody\n```"), "body");
    }

    #[test]
    fn python_literal_quotes_are_rejected() {
        assert!(parse_components("[{'component': 'x'}]").is_err());
    }
}
