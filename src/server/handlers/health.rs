use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Map};

use crate::core::errors::{ApiError, BackendError};
use crate::database::ProviderId;
use crate::server::handlers::utils::Fields;
use crate::state::AppState;

/// Reports every provider's health; the service is "ok" while any one is up.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let report = state.registry.health_report().await;
    let status = if report.iter().any(|(_, healthy)| *healthy) {
        "ok"
    } else {
        "error"
    };

    let mut services = Map::new();
    for (provider, healthy) in report {
        let label = if healthy { "healthy" } else { "unhealthy" };
        services.insert(provider.to_string(), json!(label));
    }

    Json(json!({
        "status": status,
        "services": services,
        "current_provider": state.search.current_provider(),
    }))
}

/// Hot-swaps the live search backend.
pub async fn switch_provider(
    State(state): State<Arc<AppState>>,
    fields: Fields,
) -> Result<impl IntoResponse, ApiError> {
    let requested = fields
        .non_blank("provider")
        .ok_or_else(|| ApiError::BadRequest("provider field is required".into()))?;
    let provider: ProviderId = requested
        .parse()
        .map_err(|e: BackendError| ApiError::BadRequest(e.to_string()))?;

    state.search.switch_provider(provider).await?;
    Ok(Json(json!({
        "status": "success",
        "current_provider": provider,
    })))
}
