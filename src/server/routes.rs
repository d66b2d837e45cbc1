//! Router configuration for the API server.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/skins", get(handlers::list_skins))
        // Refresh control
        .route("/refresh", post(handlers::trigger_refresh))
        .route("/refresh/status", get(handlers::refresh_status))
        // Lookups
        .route("/character/:name", get(handlers::character_skins))
        .route("/skin/:skin_id", get(handlers::skin_by_id))
        .route("/skin/name/:name", get(handlers::skins_by_name))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
