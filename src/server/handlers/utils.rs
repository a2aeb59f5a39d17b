use std::collections::HashMap;

use axum::extract::{FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use axum::{Form, Json};
use serde_json::{Map, Value};

use crate::core::errors::ApiError;

/// Request body fields, read from JSON or from a urlencoded form.
#[derive(Debug, Default)]
pub struct Fields(pub Map<String, Value>);

#[axum::async_trait]
impl<S> FromRequest<S> for Fields
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/json"))
            .unwrap_or(false);

        if is_json {
            let Json(value) = Json::<Value>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            return match value {
                Value::Object(map) => Ok(Fields(map)),
                _ => Err(ApiError::BadRequest("Request body must be a JSON object".into())),
            };
        }

        let Form(form) = Form::<HashMap<String, String>>::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        Ok(Fields(
            form.into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect(),
        ))
    }
}

impl Fields {
    /// Scalar field as text; absent and null read as `None`.
    pub fn text(&self, name: &str) -> Option<String> {
        match self.0.get(name) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }

    /// Non-blank text field, or `None`.
    pub fn non_blank(&self, name: &str) -> Option<String> {
        self.text(name).filter(|v| !v.trim().is_empty())
    }

    pub fn require_query(&self) -> Result<String, ApiError> {
        self.non_blank("query")
            .ok_or_else(|| ApiError::BadRequest("Query parameter is required".into()))
    }

    /// `limit` as a positive count; an empty value means "not given".
    pub fn limit(&self) -> Result<Option<usize>, ApiError> {
        match self.0.get("limit") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .filter(|n| *n > 0)
                .map(|n| Some(n as usize))
                .ok_or_else(|| ApiError::BadRequest("limit must be a positive integer".into())),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => s
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .map(Some)
                .ok_or_else(|| ApiError::BadRequest("limit must be a positive integer".into())),
            Some(_) => Err(ApiError::BadRequest("limit must be a positive integer".into())),
        }
    }
}
