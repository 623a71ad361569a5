use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::health;
use super::keys;
use super::state::AppState;

/// Create the application router.
///
/// Browser clients call the API directly, so CORS stays permissive (the
/// original deployment did the same); policy tuning belongs to whatever
/// fronts this service.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(keys::service_info))
        // Health endpoints
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        // Key lifecycle endpoints
        .route("/api/validate", post(keys::validate_key))
        .route("/api/activate", post(keys::activate_key))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
