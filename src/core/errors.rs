use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Failures raised inside the retrieval core.
///
/// Only `MalformedDecomposition` and `ProviderResolution` are allowed to reach
/// a caller of a workflow; adapter-level variants are converted to empty
/// results by [`crate::database::or_empty`].
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("upstream call failed: {0}")]
    Upstream(String),
    #[error("malformed decomposition: {0}")]
    MalformedDecomposition(String),
    #[error("provider resolution failed: {0}")]
    ProviderResolution(String),
    #[error("{operation} is not supported by {provider}")]
    Unsupported {
        provider: &'static str,
        operation: &'static str,
    },
}

impl BackendError {
    pub fn connection<E: std::fmt::Display>(err: E) -> Self {
        BackendError::Connection(err.to_string())
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Upstream(format!("request timed out: {}", err))
        } else {
            BackendError::Upstream(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("bad gateway: {0}")]
    BadGateway(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::ProviderResolution(_) | BackendError::Connection(_) => {
                ApiError::ServiceUnavailable(err.to_string())
            }
            BackendError::MalformedDecomposition(_) | BackendError::Upstream(_) => {
                ApiError::BadGateway(err.to_string())
            }
            BackendError::Unsupported { .. } => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
