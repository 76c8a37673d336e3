//! Server configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Upstream (origin CDN) client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Total time allowed for a single upstream request, body included
    pub timeout_secs: u64,

    /// Time allowed to establish the upstream connection
    pub connect_timeout_secs: u64,

    /// User-Agent sent upstream
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: format!("iptv-proxy/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// A channel defined directly in the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticChannel {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub picture: String,
}

/// Where channel definitions come from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// JSON links file maintained by the discovery job
    pub links_file: Option<PathBuf>,

    /// Reload interval for the links file, 0 disables reloading
    pub refresh_secs: u64,

    /// Channels that never change
    pub static_channels: Vec<StaticChannel>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log output format (pretty, json)
    pub log_format: String,

    /// Upstream client configuration
    pub upstream: UpstreamConfig,

    /// Channel sources
    pub channels: ChannelsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_enabled: true,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            upstream: UpstreamConfig::default(),
            channels: ChannelsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
