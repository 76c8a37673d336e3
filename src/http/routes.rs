//! Axum router configuration

use axum::{
    http::{header, Method},
    middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

use super::handlers::{channel_playlist, debug_channels, health_check, version_check};
use super::middleware::request_logger;
use super::proxy::handle_channel_request;

/// Create the Axum router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        // Health and version endpoints
        .route("/health", get(health_check))
        .route("/version", get(version_check))
        // Debug endpoints
        .route("/debug/channels", get(debug_channels))
        // Channel list and proxied channels
        .route("/iptv.m3u", get(channel_playlist))
        .route("/iptv/{*path}", get(handle_channel_request))
        // Middleware
        .layer(middleware::from_fn(request_logger))
        .layer(TraceLayer::new_for_http());

    if state.config.cors_enabled {
        // Browser players fetch manifests and segments cross-origin.
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
            .allow_headers([header::ACCEPT, header::RANGE, header::ORIGIN])
            .max_age(Duration::from_secs(3600));
        router = router.layer(cors);
    }

    router.with_state(state)
}
