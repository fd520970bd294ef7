//! Router

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{
    ai_handler, create_checkout, create_portal, get_entitlement, health_check, list_tools,
    stripe_webhook,
};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/tools", get(list_tools))
        // AI tools
        .route("/api/ai", post(ai_handler))
        .route("/api/entitlement", get(get_entitlement))
        // Billing
        .route("/api/checkout", post(create_checkout))
        .route("/api/portal", post(create_portal))
        .route("/api/webhook", post(stripe_webhook))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
