//! HTTP request handlers
//!
//! Health, version, and channel listing endpoints. The proxy itself lives
//! in [`super::proxy`].

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::channels::render_playlist;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

/// Version endpoint
pub async fn version_check() -> &'static str {
    concat!("iptv-proxy v", env!("CARGO_PKG_VERSION"))
}

/// Channel list as an M3U playlist pointing through this proxy
/// GET /iptv.m3u
pub async fn channel_playlist(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| state.config.socket_addr());

    let base_url = format!("http://{}", host);
    let playlist = render_playlist(&state.registry.snapshot(), Some(&base_url));

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("audio/x-mpegurl"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));

    (headers, playlist).into_response()
}

/// Debug endpoint - registered channels
pub async fn debug_channels(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let channels: Vec<_> = state
        .registry
        .snapshot()
        .iter()
        .map(|c| {
            serde_json::json!({
                "name": c.name,
                "stream_url": c.stream_url,
                "stream_url_root": c.stream_url_root,
                "picture": c.picture,
                "available": c.is_available(),
            })
        })
        .collect();

    Json(serde_json::json!({
        "count": channels.len(),
        "channels": channels,
    }))
}
