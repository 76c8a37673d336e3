//! Application state management
//!
//! This module defines the AppState structure that holds:
//! - The channel registry
//! - The shared upstream HTTP client
//! - Server configuration

use reqwest::Client;
use std::sync::Arc;

use crate::config::{ServerConfig, UpstreamConfig};
use crate::error::Result;
use crate::registry::ChannelRegistry;

/// Application state shared across all handlers
pub struct AppState {
    /// Channel name -> upstream location
    pub registry: Arc<ChannelRegistry>,

    /// Client for every upstream fetch
    pub http_client: Client,

    /// Server configuration
    pub config: ServerConfig,
}

impl AppState {
    /// Create a new AppState reading from `registry`
    pub fn new(config: ServerConfig, registry: Arc<ChannelRegistry>) -> Result<Self> {
        let http_client = build_http_client(&config.upstream)?;
        Ok(Self {
            registry,
            http_client,
            config,
        })
    }
}

/// Build the upstream client. Requests are bounded by the configured
/// timeouts so a stalled origin cannot hold a connection forever.
pub fn build_http_client(upstream: &UpstreamConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(upstream.user_agent.clone())
        .connect_timeout(upstream.connect_timeout())
        .timeout(upstream.timeout())
        .build()?;
    Ok(client)
}
