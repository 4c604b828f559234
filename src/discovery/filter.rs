//! Manifest URL filter

use url::Url;

use crate::utils::constants::{EXCLUDED_PREFIXES, MANIFEST_MARKER};

/// Whether `url` looks like a fetchable HLS manifest.
///
/// A manifest URL contains `.m3u8` (any case), is not a `blob:` or `data:`
/// URL, and parses as an absolute URL with a host.
pub fn is_manifest_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();

    if !lower.contains(MANIFEST_MARKER) {
        return false;
    }

    if EXCLUDED_PREFIXES
        .iter()
        .any(|prefix| lower.trim_start().starts_with(prefix))
    {
        return false;
    }

    parse_absolute_url(url).is_some()
}

/// Parse `url` and keep it only when both scheme and host are present.
pub fn parse_absolute_url(url: &str) -> Option<Url> {
    let parsed = Url::parse(url).ok()?;
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Some(parsed),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_manifest_urls() {
        assert!(is_manifest_url("https://cdn.example.com/hls/master.m3u8"));
        assert!(is_manifest_url("https://cdn.example.com/index.m3u8?token=abc"));
        assert!(is_manifest_url("http://10.0.0.2:8080/live/stream.M3U8"));
    }

    #[test]
    fn rejects_urls_without_marker() {
        assert!(!is_manifest_url("https://cdn.example.com/video.mp4"));
        assert!(!is_manifest_url("https://cdn.example.com/seg-001.ts"));
        assert!(!is_manifest_url("https://cdn.example.com/m3u8/list"));
        assert!(!is_manifest_url(""));
    }

    #[test]
    fn rejects_blob_and_data_urls_even_with_marker() {
        assert!(!is_manifest_url("blob:https://player.example.com/5f1c.m3u8"));
        assert!(!is_manifest_url("BLOB:https://player.example.com/x.m3u8"));
        assert!(!is_manifest_url("data:application/vnd.apple.mpegurl;name=x.m3u8,#EXTM3U"));
    }

    #[test]
    fn rejects_relative_and_hostless_urls() {
        assert!(!is_manifest_url("/hls/master.m3u8"));
        assert!(!is_manifest_url("master.m3u8"));
        assert!(!is_manifest_url("file:///tmp/master.m3u8"));
        assert!(!is_manifest_url("mailto:someone@example.com.m3u8"));
    }

    #[test]
    fn parse_absolute_url_requires_host() {
        assert!(parse_absolute_url("https://example.com/watch?v=1").is_some());
        assert!(parse_absolute_url("not-a-url").is_none());
        assert!(parse_absolute_url("example.com/page").is_none());
        assert!(parse_absolute_url("about:blank").is_none());
    }
}
