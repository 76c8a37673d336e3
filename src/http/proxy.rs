//! Channel proxy handler
//!
//! GET /iptv/{channel}.m3u8        entry playlist, rewritten
//! GET /iptv/{channel}/{*rest}     nested playlist or key, rewritten
//! GET /iptv/{channel}/{*rest}.ts  media segment, streamed as-is

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::request::ChannelRequest;
use super::rewrite::{rewrite_stream, ManifestRewriter};
use crate::error::ProxyError;
use crate::state::AppState;

const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const SEGMENT_CONTENT_TYPE: &str = "video/mp2t";

/// Proxy a channel playlist or one of its sub-resources.
///
/// The raw request URI is used rather than a `Path` extractor so that
/// `rest` reaches the upstream exactly as the client sent it.
pub async fn handle_channel_request(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, ProxyError> {
    proxy_channel(&state, &uri, &headers).await.map_err(|e| {
        match &e {
            ProxyError::UpstreamUnreachable { .. } => error!("{}: {}", uri.path(), e),
            _ => warn!("{}: {}", uri.path(), e),
        }
        e
    })
}

async fn proxy_channel(
    state: &AppState,
    uri: &Uri,
    headers: &HeaderMap,
) -> Result<Response, ProxyError> {
    let request = ChannelRequest::parse(uri.path(), uri.query())?;

    let entry = state
        .registry
        .lookup(&request.channel)
        .ok_or_else(|| ProxyError::UnknownChannel(request.channel.clone()))?;

    let upstream_url = request.upstream_url(&entry)?;
    debug!("Fetching {} for channel '{}'", upstream_url, request.channel);

    let upstream = state
        .http_client
        .get(&upstream_url)
        .send()
        .await
        .map_err(|source| ProxyError::UpstreamUnreachable {
            url: upstream_url.clone(),
            source,
        })?;

    if upstream.status() != StatusCode::OK {
        return Err(ProxyError::UpstreamError(upstream.status()));
    }

    if request.is_raw() {
        return Ok(passthrough(upstream));
    }

    let host = request_host(headers, uri, &state.config.socket_addr());
    let rewriter = Arc::new(ManifestRewriter::new(
        &host,
        &request.encoded_channel,
        &entry.stream_url_root,
    ));
    debug!("Rewriting manifest from {} under {}", upstream_url, rewriter.prefix());

    let body = Body::from_stream(rewrite_stream(rewriter, upstream.bytes_stream()));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    let response_headers = response.headers_mut();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(MANIFEST_CONTENT_TYPE),
    );
    response_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    Ok(response)
}

/// Stream a media segment back without looking at it.
fn passthrough(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(SEGMENT_CONTENT_TYPE));
    let content_length = upstream.headers().get(header::CONTENT_LENGTH).cloned();

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    if let Some(len) = content_length {
        headers.insert(header::CONTENT_LENGTH, len);
    }
    response
}

/// Host the client used to reach us, for building absolute proxy URLs.
fn request_host(headers: &HeaderMap, uri: &Uri, fallback: &str) -> String {
    headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.to_string()))
        .unwrap_or_else(|| fallback.to_string())
}
