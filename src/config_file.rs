//! Configuration file support
//!
//! Loads server configuration from TOML files. Every section is optional;
//! anything left out falls back to [`ServerConfig::default`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{ChannelsConfig, ServerConfig, StaticChannel, UpstreamConfig};
use crate::error::Result;

/// Configuration file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Server settings
    pub server: Option<ServerSettings>,
    /// Upstream client settings
    pub upstream: Option<UpstreamSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
    /// Channel sources
    pub channels: Option<ChannelSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to
    pub host: Option<String>,
    /// Port to listen on
    pub port: Option<u16>,
    /// Enable CORS
    pub cors_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamSettings {
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// JSON links file written by the discovery job
    pub links_file: Option<PathBuf>,
    /// Reload interval in seconds
    pub refresh_secs: Option<u64>,
    /// Fixed channels
    #[serde(default, rename = "static")]
    pub static_channels: Vec<StaticChannel>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ConfigFile = toml::from_str(&content)?;
        Ok(config)
    }

    /// Convert to ServerConfig
    pub fn into_server_config(self) -> ServerConfig {
        let defaults = ServerConfig::default();
        let upstream_defaults = UpstreamConfig::default();

        let server = self.server;
        let upstream = self.upstream;
        let channels = self.channels;

        ServerConfig {
            host: server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(defaults.host),
            port: server.as_ref().and_then(|s| s.port).unwrap_or(defaults.port),
            cors_enabled: server
                .as_ref()
                .and_then(|s| s.cors_enabled)
                .unwrap_or(defaults.cors_enabled),
            log_level: self
                .logging
                .as_ref()
                .map(|l| l.level.clone())
                .unwrap_or(defaults.log_level),
            log_format: self
                .logging
                .and_then(|l| l.format)
                .unwrap_or(defaults.log_format),
            upstream: UpstreamConfig {
                timeout_secs: upstream
                    .as_ref()
                    .and_then(|u| u.timeout_secs)
                    .unwrap_or(upstream_defaults.timeout_secs),
                connect_timeout_secs: upstream
                    .as_ref()
                    .and_then(|u| u.connect_timeout_secs)
                    .unwrap_or(upstream_defaults.connect_timeout_secs),
                user_agent: upstream
                    .and_then(|u| u.user_agent)
                    .unwrap_or(upstream_defaults.user_agent),
            },
            channels: match channels {
                Some(c) => ChannelsConfig {
                    links_file: c.links_file,
                    refresh_secs: c.refresh_secs.unwrap_or(0),
                    static_channels: c.static_channels,
                },
                None => defaults.channels,
            },
        }
    }
}

/// Load the server configuration from `path`.
///
/// A missing file yields the defaults. A file that exists but cannot be
/// read or parsed is reported and the defaults are used instead.
pub fn load_server_config<P: AsRef<Path>>(path: P) -> ServerConfig {
    let path = path.as_ref();
    if !path.exists() {
        return ServerConfig::default();
    }

    match ConfigFile::from_file(path) {
        Ok(cf) => cf.into_server_config(),
        Err(e) => {
            tracing::warn!(
                "Failed to load config file {}: {}. Using defaults.",
                path.display(),
                e
            );
            ServerConfig::default()
        }
    }
}
