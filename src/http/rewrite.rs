//! HLS manifest rewriting
//!
//! Every reference in a manifest (segment and playlist lines, `URI="..."`
//! attributes on tags) is turned into an absolute URL pointing back at
//! this proxy, under the channel it was fetched for:
//!
//! ```text
//! seg1.ts                      -> http://<host>/iptv/<channel>/seg1.ts
//! #EXT-X-KEY:URI="k/1.key"     -> #EXT-X-KEY:URI="http://<host>/iptv/<channel>/k/1.key"
//! http://<root>/hd/index.m3u8  -> http://<host>/iptv/<channel>/hd/index.m3u8
//! ```
//!
//! A proxy path can only name locations below the channel root. Absolute
//! references anywhere else are left as they are, and root-relative
//! (`/path`) or scheme-relative (`//host/path`) references outside the root
//! are resolved to absolute upstream URLs. Clients fetch those directly
//! from upstream, bypassing the proxy.
//!
//! Manifests are handled as bytes. Lines that need no rewriting are copied
//! through unchanged, whatever their encoding.

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use std::borrow::Cow;
use std::pin::Pin;
use std::sync::Arc;

use super::request::IPTV_PREFIX;

/// Longest partial line held while waiting for its newline.
pub const MAX_PENDING_LINE: usize = 4 * 1024 * 1024;

// helper.
macro_rules! regex {
    ($re:literal $(,)?) => {{
        static RE: std::sync::OnceLock<regex::bytes::Regex> = std::sync::OnceLock::new();
        RE.get_or_init(|| regex::bytes::Regex::new($re).unwrap())
    }};
}

/// Rewrites manifest lines for one channel.
#[derive(Debug, Clone)]
pub struct ManifestRewriter {
    /// `http://<host>/iptv/<encoded channel>/`
    prefix: String,
    /// Upstream directory the proxy path is relative to
    root: String,
    /// Scheme of the root, for `//host/path` references
    root_scheme: Option<String>,
    /// `scheme://host[:port]` of the root, for `/path` references
    root_origin: Option<String>,
}

impl ManifestRewriter {
    pub fn new(host: &str, encoded_channel: &str, stream_url_root: &str) -> Self {
        let parsed = url::Url::parse(stream_url_root).ok();
        Self {
            prefix: format!("http://{}{}{}/", host, IPTV_PREFIX, encoded_channel),
            root: stream_url_root.to_string(),
            root_scheme: parsed.as_ref().map(|u| u.scheme().to_string()),
            root_origin: parsed
                .as_ref()
                .map(|u| u.origin())
                .filter(|o| o.is_tuple())
                .map(|o| o.ascii_serialization()),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Rewrite a single line, without its terminator.
    pub fn rewrite_line<'a>(&self, line: &'a [u8]) -> Cow<'a, [u8]> {
        if line.starts_with(b"#") {
            return self.rewrite_tag(line);
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            return Cow::Borrowed(line);
        }
        self.rewrite_reference(line)
    }

    fn rewrite_tag<'a>(&self, line: &'a [u8]) -> Cow<'a, [u8]> {
        // `(?-u:...)` so attribute values need not be valid UTF-8.
        regex!(r#"URI="((?-u:[^"])*)""#).replace_all(line, |caps: &regex::bytes::Captures| {
            let uri = &caps[1];
            if uri.is_empty() {
                return caps[0].to_vec();
            }
            let mut attr = b"URI=\"".to_vec();
            attr.extend_from_slice(&self.rewrite_reference(uri));
            attr.push(b'"');
            attr
        })
    }

    fn rewrite_reference<'a>(&self, reference: &'a [u8]) -> Cow<'a, [u8]> {
        if is_absolute(reference) {
            return match self.relocate(reference) {
                Some(proxied) => Cow::Owned(proxied),
                None => Cow::Borrowed(reference),
            };
        }

        if let Some(rest) = reference.strip_prefix(b"//") {
            if let Some(scheme) = &self.root_scheme {
                let mut absolute = scheme.as_bytes().to_vec();
                absolute.extend_from_slice(b"://");
                absolute.extend_from_slice(rest);
                return match self.relocate(&absolute) {
                    Some(proxied) => Cow::Owned(proxied),
                    None => Cow::Borrowed(reference),
                };
            }
        } else if reference.starts_with(b"/") {
            if let Some(origin) = &self.root_origin {
                let mut absolute = origin.as_bytes().to_vec();
                absolute.extend_from_slice(reference);
                return Cow::Owned(self.relocate(&absolute).unwrap_or(absolute));
            }
        }

        Cow::Owned(self.proxied(reference))
    }

    /// Map an absolute upstream URL below the root onto the proxy.
    fn relocate(&self, absolute: &[u8]) -> Option<Vec<u8>> {
        if self.root.is_empty() {
            return None;
        }
        absolute
            .strip_prefix(self.root.as_bytes())
            .map(|rest| self.proxied(rest))
    }

    fn proxied(&self, rest: &[u8]) -> Vec<u8> {
        let mut url = Vec::with_capacity(self.prefix.len() + rest.len());
        url.extend_from_slice(self.prefix.as_bytes());
        url.extend_from_slice(rest);
        url
    }

    /// Rewrite every complete line in `buf`, leaving a trailing partial
    /// line in place. Lines end in `\n` on output.
    fn drain_lines(&self, buf: &mut BytesMut, out: &mut BytesMut) {
        let Some(last_newline) = buf.iter().rposition(|b| *b == b'\n') else {
            return;
        };
        let complete = buf.split_to(last_newline + 1);
        for line in complete[..last_newline].split(|b| *b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            out.extend_from_slice(&self.rewrite_line(line));
            out.extend_from_slice(b"\n");
        }
    }
}

fn is_absolute(reference: &[u8]) -> bool {
    starts_with_ignore_case(reference, b"http://") || starts_with_ignore_case(reference, b"https://")
}

fn starts_with_ignore_case(s: &[u8], prefix: &[u8]) -> bool {
    s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix)
}

struct RewriteState<S> {
    upstream: Pin<Box<S>>,
    rewriter: Arc<ManifestRewriter>,
    buf: BytesMut,
    done: bool,
}

/// Rewrite a manifest body as it streams in from upstream.
///
/// Output is produced per upstream chunk, one complete line at a time, so
/// the whole manifest is never buffered. A final line without a newline
/// is still emitted, with one. A partial line longer than
/// [`MAX_PENDING_LINE`] ends the stream with an error.
pub fn rewrite_stream<S, E>(
    rewriter: Arc<ManifestRewriter>,
    upstream: S,
) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let state = RewriteState {
        upstream: Box::pin(upstream),
        rewriter,
        buf: BytesMut::new(),
        done: false,
    };

    futures_util::stream::unfold(state, |mut st| async move {
        loop {
            if st.done {
                if st.buf.is_empty() {
                    return None;
                }
                st.buf.extend_from_slice(b"\n");
                let mut out = BytesMut::new();
                st.rewriter.drain_lines(&mut st.buf, &mut out);
                return Some((Ok(out.freeze()), st));
            }

            match st.upstream.next().await {
                Some(Ok(chunk)) => {
                    st.buf.extend_from_slice(&chunk);
                    let mut out = BytesMut::new();
                    st.rewriter.drain_lines(&mut st.buf, &mut out);
                    if st.buf.len() > MAX_PENDING_LINE {
                        tracing::error!(
                            "Manifest line from upstream exceeds {} bytes",
                            MAX_PENDING_LINE
                        );
                        st.done = true;
                        st.buf.clear();
                        return Some((
                            Err(std::io::Error::new(
                                std::io::ErrorKind::InvalidData,
                                "manifest line too long",
                            )),
                            st,
                        ));
                    }
                    if !out.is_empty() {
                        return Some((Ok(out.freeze()), st));
                    }
                }
                Some(Err(e)) => {
                    tracing::error!("Manifest stream from upstream failed: {}", e);
                    st.done = true;
                    st.buf.clear();
                    return Some((Err(std::io::Error::other(e)), st));
                }
                None => st.done = true,
            }
        }
    })
}
