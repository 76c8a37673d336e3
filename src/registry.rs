//! Channel registry
//!
//! Maps a channel's public name to its upstream stream location. The
//! registry is read on every proxied request and written by whatever
//! discovers stream URLs (see [`crate::channels`]).
//!
//! Entries are stored behind an `Arc` and swapped as a whole under the
//! write lock, so a reader holding an entry never sees a mix of old and
//! new fields.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A single live channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEntry {
    /// Public name, used in proxy URLs.
    pub name: String,
    /// Absolute URL of the channel's entry playlist. Empty when the channel
    /// is not currently live.
    pub stream_url: String,
    /// `stream_url` up to and including the last path separator.
    pub stream_url_root: String,
    /// Logo URL, only used for playlist listings.
    pub picture: String,
}

impl ChannelEntry {
    pub fn new(name: impl Into<String>, stream_url: impl Into<String>, picture: impl Into<String>) -> Self {
        let stream_url = stream_url.into();
        let stream_url_root = stream_url_root(&stream_url).to_string();
        Self {
            name: name.into(),
            stream_url,
            stream_url_root,
            picture: picture.into(),
        }
    }

    /// Whether the channel currently has a stream to proxy.
    pub fn is_available(&self) -> bool {
        !self.stream_url.is_empty()
    }
}

/// Directory part of a stream URL.
///
/// The query string is ignored when looking for the last `/`, since
/// tokens appended by CDNs may themselves contain slashes.
pub fn stream_url_root(stream_url: &str) -> &str {
    let path_end = stream_url.find(['?', '#']).unwrap_or(stream_url.len());
    match stream_url[..path_end].rfind('/') {
        Some(idx) => &stream_url[..=idx],
        None => "",
    }
}

/// Concurrent name -> channel mapping.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: RwLock<HashMap<String, Arc<ChannelEntry>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a channel by its decoded name. Never blocks on I/O.
    pub fn lookup(&self, name: &str) -> Option<Arc<ChannelEntry>> {
        self.channels.read().get(name).cloned()
    }

    /// Insert or replace a channel. The root prefix is derived here, once.
    pub fn upsert(&self, name: &str, stream_url: &str, picture: &str) {
        let entry = Arc::new(ChannelEntry::new(name, stream_url, picture));
        let previous = self.channels.write().insert(name.to_string(), entry);

        match previous {
            Some(old) if old.stream_url != stream_url => {
                tracing::debug!("Channel '{}' moved to {}", name, stream_url);
            }
            Some(_) => {}
            None => tracing::debug!("Channel '{}' registered at {}", name, stream_url),
        }
    }

    /// All channels, sorted by name.
    pub fn snapshot(&self) -> Vec<Arc<ChannelEntry>> {
        let mut entries: Vec<_> = self.channels.read().values().cloned().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }
}
