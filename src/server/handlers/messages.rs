use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use chrono::{Duration, SecondsFormat, Utc};
use serde_json::json;

use crate::core::errors::ApiError;
use crate::database::azure::MESSAGE_INDEX;
use crate::database::{
    Document, MessageFormat, ProviderId, RenderedResult, DEFAULT_MESSAGE_LIMIT,
    DEFAULT_POLICY_LIMIT,
};
use crate::server::handlers::utils::Fields;
use crate::state::AppState;

const DEFAULT_RECENT_DAYS: i64 = 3;

fn render(result: RenderedResult) -> Response {
    match result {
        RenderedResult::Html(html) => Html(html).into_response(),
        records => Json(records.into_json()).into_response(),
    }
}

/// Vector search over stored messages, answered with the message table.
pub async fn messages(
    State(state): State<Arc<AppState>>,
    fields: Fields,
) -> Result<Response, ApiError> {
    let query = fields.require_query()?;
    let limit = fields.limit()?.unwrap_or(DEFAULT_MESSAGE_LIMIT);

    let backend = state.registry.message_service().await?;
    Ok(render(backend.get_message_descriptions(&query, limit).await))
}

/// Searches whatever the live provider indexes: messages on Azure, policy
/// assertions on Astra. Unlike the message routes this follows provider switches.
pub async fn search(
    State(state): State<Arc<AppState>>,
    fields: Fields,
) -> Result<impl IntoResponse, ApiError> {
    let query = fields.require_query()?;
    let limit = fields.limit()?;

    let backend = state.registry.get_service(None).await?;
    let provider = backend.provider();
    let results = match provider {
        ProviderId::Azure => {
            backend
                .search_messages(&query, limit.unwrap_or(DEFAULT_MESSAGE_LIMIT))
                .await
        }
        ProviderId::Astra => {
            backend
                .get_policy_assertions(&query, limit.unwrap_or(DEFAULT_POLICY_LIMIT))
                .await
        }
    };
    let count = results.len();

    Ok(Json(json!({
        "query": query,
        "results": RenderedResult::Records(results).into_json(),
        "count": count,
        "provider": provider,
    })))
}

pub async fn add_message(
    State(state): State<Arc<AppState>>,
    fields: Fields,
) -> Result<impl IntoResponse, ApiError> {
    let message = fields
        .non_blank("message")
        .ok_or_else(|| ApiError::BadRequest("'message' field is required".into()))?;
    let id = fields
        .non_blank("id")
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let upload_date = fields
        .non_blank("uploadDate")
        .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));

    let document = Document::new()
        .with("id", id.as_str())
        .with("message", message)
        .with("summary", fields.text("summary").unwrap_or_default())
        .with("uploadDate", upload_date)
        .with("url", fields.text("url").unwrap_or_default())
        .with("tag", fields.text("tag").unwrap_or_default());

    let backend = state.registry.message_service().await?;
    if !backend.upload_documents(MESSAGE_INDEX, vec![document]).await {
        return Err(ApiError::Internal("Failed to upload message.".into()));
    }

    Ok(Json(json!({
        "status": "success",
        "message": "Message uploaded.",
        "id": id,
    })))
}

pub async fn delete_messages(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let backend = state.registry.message_service().await?;
    if !backend.delete_all_documents(MESSAGE_INDEX).await {
        return Err(ApiError::Internal("Failed to delete messages.".into()));
    }
    Ok(Json(json!({ "status": "success", "message": "All messages deleted." })))
}

/// Messages uploaded in the last `days` days (default 3), as a table or records.
pub async fn recent_messages(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let days = match params.get("days").map(|d| d.trim()) {
        None | Some("") => DEFAULT_RECENT_DAYS,
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|_| ApiError::BadRequest("Days parameter must be an integer".into()))?,
    };
    if days < 1 {
        return Err(ApiError::BadRequest("Days parameter must be at least 1".into()));
    }

    let format = match params.get("format") {
        None => MessageFormat::default(),
        Some(raw) => raw.parse::<MessageFormat>().map_err(ApiError::BadRequest)?,
    };

    let since = Utc::now() - Duration::days(days);
    let backend = state.registry.message_service().await?;
    Ok(render(backend.get_messages_since(since, format).await))
}

pub async fn delete_message(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let id = params
        .get("id")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Message ID is required.".into()))?;

    let backend = state.registry.message_service().await?;
    if !backend.delete_document_by_id(MESSAGE_INDEX, &id).await {
        return Err(ApiError::Internal(format!(
            "Failed to delete message with ID {}.",
            id
        )));
    }
    Ok(Json(json!({
        "status": "success",
        "message": format!("Message with ID {} deleted.", id),
    })))
}

pub async fn retag(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let backend = state.registry.message_service().await?;
    if !backend.retag_all_messages().await {
        return Err(ApiError::Internal("Failed to retag all messages.".into()));
    }
    Ok(Json(json!({ "status": "success", "message": "All messages retagged successfully." })))
}
