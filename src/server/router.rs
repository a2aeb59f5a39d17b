use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{health, messages, queries};
use crate::state::AppState;

/// Creates the application router: query workflows, message maintenance,
/// health and provider switching, behind CORS and request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state);
    Router::new()
        .route("/health", get(health::health))
        .route("/provider", post(health::switch_provider))
        .route("/enquiries", post(queries::enquiries))
        .route("/policyquery", post(queries::policy_query))
        .route("/visitorevidence", post(queries::visitor_evidence))
        .route("/blog", post(queries::blog))
        .route("/advancedquery", post(queries::advanced_query))
        .route("/graphcontext", post(queries::graph_context))
        .route("/messages", post(messages::messages))
        .route("/search", post(messages::search))
        .route("/add_message", post(messages::add_message))
        .route("/delete_messages", delete(messages::delete_messages))
        .route("/get_recent_messages", get(messages::recent_messages))
        .route("/delete_message", get(messages::delete_message))
        .route("/retag", get(messages::retag))
        .with_state(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(state: &Arc<AppState>) -> CorsLayer {
    let allowed_origins = resolve_allowed_origins(&state.config.server.cors_allowed_origins)
        .into_iter()
        .filter_map(|origin| HeaderValue::from_str(&origin).ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
}

fn resolve_allowed_origins(configured: &[String]) -> Vec<String> {
    let origins = configured
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();

    if origins.is_empty() {
        return default_local_origins();
    }
    origins
}

fn default_local_origins() -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
        "http://127.0.0.1".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:5173".to_string(),
        "http://127.0.0.1:8000".to_string(),
    ]
}
