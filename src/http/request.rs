//! Proxy request classification
//!
//! Turns `/iptv/<channel>[/<rest>]` into a [`ChannelRequest`] once per
//! request, so the handler only matches on [`RequestKind`] to decide
//! between manifest rewriting and raw passthrough.

use crate::error::ProxyError;
use crate::registry::ChannelEntry;

/// Route prefix for proxied channels
pub const IPTV_PREFIX: &str = "/iptv/";

/// Suffix clients put on the top-level playlist name
const PLAYLIST_SUFFIX: &str = ".m3u8";

/// Suffix of binary media segments
const SEGMENT_SUFFIX: &str = ".ts";

/// What the client asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    /// The channel's entry playlist: `/iptv/<channel>.m3u8`
    Playlist,
    /// A nested playlist or key below the channel root, rewritten as a manifest
    Nested { rest: String },
    /// A `.ts` media segment, passed through untouched
    Segment { rest: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRequest {
    /// Channel path segment exactly as received
    pub encoded_channel: String,
    /// Decoded channel name, the registry key
    pub channel: String,
    pub kind: RequestKind,
}

impl ChannelRequest {
    /// Parse a request path (without the query) and optional query string.
    ///
    /// The query is only kept for sub-resources, appended to `rest` as
    /// received.
    pub fn parse(path: &str, query: Option<&str>) -> Result<Self, ProxyError> {
        let remainder = path.strip_prefix(IPTV_PREFIX).unwrap_or(path);

        let (channel_segment, rest) = match remainder.split_once('/') {
            Some((channel, rest)) => (channel, rest),
            None => (remainder, ""),
        };

        let kind = if rest.is_empty() {
            RequestKind::Playlist
        } else {
            let rest = match query {
                Some(q) if !q.is_empty() => format!("{}?{}", rest, q),
                _ => rest.to_string(),
            };
            if path.ends_with(SEGMENT_SUFFIX) {
                RequestKind::Segment { rest }
            } else {
                RequestKind::Nested { rest }
            }
        };

        let encoded_channel = match kind {
            RequestKind::Playlist => channel_segment
                .strip_suffix(PLAYLIST_SUFFIX)
                .unwrap_or(channel_segment),
            _ => channel_segment,
        };

        let channel = unescape(encoded_channel)
            .ok_or_else(|| ProxyError::BadChannelReference(encoded_channel.to_string()))?;

        Ok(Self {
            encoded_channel: encoded_channel.to_string(),
            channel,
            kind,
        })
    }

    /// Resolve the upstream URL for this request against a registry entry.
    pub fn upstream_url(&self, entry: &ChannelEntry) -> Result<String, ProxyError> {
        match &self.kind {
            RequestKind::Playlist if entry.is_available() => Ok(entry.stream_url.clone()),
            RequestKind::Playlist => Err(ProxyError::ChannelUnavailable(self.channel.clone())),
            RequestKind::Nested { rest } | RequestKind::Segment { rest } => {
                if entry.stream_url_root.is_empty() {
                    return Err(ProxyError::ChannelUnavailable(self.channel.clone()));
                }
                Ok(format!("{}{}", entry.stream_url_root, rest))
            }
        }
    }

    /// Whether the upstream body must be returned byte-for-byte.
    pub fn is_raw(&self) -> bool {
        matches!(self.kind, RequestKind::Segment { .. })
    }
}

/// Query-style unescape: `+` is a space, `%XX` a byte.
///
/// Returns `None` for a truncated or non-hex escape, or if the decoded
/// bytes are not UTF-8.
fn unescape(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return None;
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    let spaced = s.replace('+', " ");
    urlencoding::decode(&spaced).ok().map(|c| c.into_owned())
}
