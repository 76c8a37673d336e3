//! Channel sources
//!
//! Fills the [`ChannelRegistry`] from the configuration's static channels
//! and from the links file written by the discovery job, and renders the
//! registry as an extended-M3U channel list.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ChannelsConfig, StaticChannel};
use crate::error::Result;
use crate::registry::{ChannelEntry, ChannelRegistry};

/// One record of the links file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub title: String,
    #[serde(default)]
    pub picture: String,
    #[serde(default)]
    pub url: String,
}

/// Read the links file. A missing file yields no records.
pub fn load_links<P: AsRef<Path>>(path: P) -> Result<Vec<LinkRecord>> {
    let path = path.as_ref();
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("Links file {} does not exist yet", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };
    let links: Vec<LinkRecord> = serde_json::from_str(&content)?;
    Ok(links)
}

/// Upsert every record; later records with the same title win.
pub fn apply_links(registry: &ChannelRegistry, links: &[LinkRecord]) {
    for link in links {
        registry.upsert(&link.title, &link.url, &link.picture);
    }
}

pub fn apply_static(registry: &ChannelRegistry, channels: &[StaticChannel]) {
    for channel in channels {
        registry.upsert(&channel.title, &channel.url, &channel.picture);
    }
}

/// Reload the links file into the registry, returning the record count.
pub fn refresh_from_file(registry: &ChannelRegistry, path: &Path) -> Result<usize> {
    let links = load_links(path)?;
    apply_links(registry, &links);
    Ok(links.len())
}

/// Load all configured sources once.
pub fn populate(registry: &ChannelRegistry, config: &ChannelsConfig) -> Result<()> {
    apply_static(registry, &config.static_channels);
    if let Some(path) = &config.links_file {
        let count = refresh_from_file(registry, path)?;
        tracing::info!("Loaded {} channel(s) from {}", count, path.display());
    }
    Ok(())
}

/// Re-read the links file every `interval`. Failures leave the registry
/// as it was.
pub fn spawn_refresher(
    registry: Arc<ChannelRegistry>,
    path: PathBuf,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately and startup already loaded the file.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let registry = Arc::clone(&registry);
            let path_bg = path.clone();
            let result =
                tokio::task::spawn_blocking(move || refresh_from_file(&registry, &path_bg)).await;
            match result {
                Ok(Ok(count)) => tracing::debug!("Refreshed {} channel(s)", count),
                Ok(Err(e)) => {
                    tracing::warn!("Failed to refresh links from {}: {}", path.display(), e)
                }
                Err(e) => tracing::error!("Links refresh task failed: {}", e),
            }
        }
    })
}

/// Render channels as an extended-M3U playlist.
///
/// With a `base_url` each channel points at this proxy, otherwise at its
/// upstream stream. Channels without a stream are skipped.
pub fn render_playlist(channels: &[Arc<ChannelEntry>], base_url: Option<&str>) -> String {
    let mut out = String::from("#EXTM3U\n");
    for channel in channels.iter().filter(|c| c.is_available()) {
        let url = match base_url {
            Some(base) => format!(
                "{}/iptv/{}.m3u8",
                base.trim_end_matches('/'),
                urlencoding::encode(&channel.name)
            ),
            None => channel.stream_url.clone(),
        };
        let _ = write!(
            out,
            "#EXTINF:-1 tvg-logo=\"{}\", {}\n{}\n\n",
            channel.picture, channel.name, url
        );
    }
    out
}
