//! Shared configuration constants for browser sessions and discovery
//!
//! This module contains default values and scripts used throughout the
//! codebase to ensure consistency and avoid magic numbers.

/// Chrome user agent string for stealth mode
///
/// Chrome releases new stable versions ~every 4 weeks.
/// Update quarterly to stay within reasonable version window.
///
/// Reference: https://chromiumdash.appspot.com/schedule
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// Scrolls to the bottom of the document so lazy-loaded players start fetching
pub const DEFAULT_SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";

/// Substring every manifest candidate must contain (compared case-insensitively)
pub const MANIFEST_MARKER: &str = ".m3u8";

/// URL prefixes that never identify a fetchable manifest
pub const EXCLUDED_PREFIXES: [&str; 2] = ["blob:", "data:"];

/// Marker used by `SelectionPolicy::PreferMaster`
pub const MASTER_PLAYLIST_MARKER: &str = "master.m3u8";

/// Asks an embedded JW Player for the HLS source of its current playlist item.
///
/// Returns an absolute URL (resolved against `location.href`) or `null`.
pub const PLAYER_PROBE_SCRIPT: &str = r#"(() => {
  try {
    if (typeof jwplayer !== 'function') return null;
    let player = jwplayer('vplayer');
    if (!player || !player.getPlaylistItem) player = jwplayer();
    if (!player || !player.getPlaylistItem) return null;
    const item = player.getPlaylistItem();
    if (!item) return null;
    const sources = Array.isArray(item.sources) ? item.sources : [];
    const hls = sources.find(s => s && (s.type === 'hls' || String(s.file || '').includes('.m3u8')));
    const file = hls ? hls.file : item.file;
    return file ? new URL(file, location.href).href : null;
  } catch (e) {
    return null;
  }
})()"#;
