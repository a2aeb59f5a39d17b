use std::sync::Arc;

use axum::extract::State;
use axum::response::Html;
use axum::Json;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::server::handlers::utils::Fields;
use crate::state::AppState;

pub async fn enquiries(
    State(state): State<Arc<AppState>>,
    fields: Fields,
) -> Result<Html<String>, ApiError> {
    let query = fields.require_query()?;
    let html = state.queries.enquiry(&query, fields.limit()?).await?;
    Ok(Html(html))
}

pub async fn policy_query(
    State(state): State<Arc<AppState>>,
    fields: Fields,
) -> Result<Html<String>, ApiError> {
    let query = fields.require_query()?;
    let html = state.queries.policy_analysis(&query, fields.limit()?).await?;
    Ok(Html(html))
}

pub async fn visitor_evidence(
    State(state): State<Arc<AppState>>,
    fields: Fields,
) -> Result<Html<String>, ApiError> {
    let query = fields.require_query()?;
    let html = state.queries.visitor_analysis(&query, fields.limit()?).await?;
    Ok(Html(html))
}

pub async fn blog(
    State(state): State<Arc<AppState>>,
    fields: Fields,
) -> Result<Html<String>, ApiError> {
    let query = fields.require_query()?;
    let html = state.queries.write_blog(&query, fields.limit()?).await?;
    Ok(Html(html))
}

pub async fn advanced_query(
    State(state): State<Arc<AppState>>,
    fields: Fields,
) -> Result<Html<String>, ApiError> {
    let query = fields.require_query()?;
    let html = state.queries.decomposed_query(&query, fields.limit()?).await?;
    Ok(Html(html))
}

/// Relationship context from the graph store; empty when none is configured.
pub async fn graph_context(
    State(state): State<Arc<AppState>>,
    fields: Fields,
) -> Result<Json<Value>, ApiError> {
    let query = fields.require_query()?;
    let context = state.queries.graph_context(&query).await;
    Ok(Json(json!({ "query": query, "context": context })))
}
