//! HLS manifest discovery through browser automation
//!
//! Drives a headless Chromium (via chromiumoxide) to a page, watches its network
//! traffic and reports the `.m3u8` manifest URLs the page loads.

mod browser;
pub mod browser_setup;
pub mod discovery;
mod manager;
pub mod session;
mod utils;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::discovery::{EarlyExitPolicy, EventKindFilter, SelectionPolicy};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

/// Browser security and launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Disable web security features (Same-Origin Policy, etc.)
    /// WARNING: Only enable for trusted content
    #[serde(default = "default_disable_security")]
    pub disable_security: bool,

    /// Accept self-signed and otherwise invalid TLS certificates.
    /// Many embed hosts serve their players from misconfigured CDNs.
    #[serde(default = "default_ignore_certificate_errors")]
    pub ignore_certificate_errors: bool,

    /// Explicit Chrome/Chromium binary. `CHROMIUM_PATH` still wins when set.
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,

    /// Timeout for individual CDP requests
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Window dimensions
    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

/// Settings for a single manifest discovery run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Polling budget used when the caller does not pass one
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: f64,

    /// Page-load timeout for each navigation. Expiry is not fatal.
    #[serde(default = "default_page_load_timeout_ms")]
    pub page_load_timeout_ms: u64,

    /// Scroll to the bottom after navigation to trigger lazy-loaded players
    #[serde(default = "default_scroll")]
    pub scroll: bool,

    #[serde(default = "default_scroll_script")]
    pub scroll_script: String,

    #[serde(default)]
    pub early_exit: EarlyExitPolicy,

    #[serde(default)]
    pub selection: SelectionPolicy,

    #[serde(default)]
    pub event_kinds: EventKindFilter,

    /// CSS selector of an iframe whose `src` should be opened before polling
    #[serde(default)]
    pub follow_iframe: Option<String>,

    /// Ask an embedded JW Player for its HLS source on every poll
    #[serde(default)]
    pub probe_player: bool,
}

fn default_headless() -> bool {
    true
}

fn default_disable_security() -> bool {
    false // SECURE BY DEFAULT
}

fn default_ignore_certificate_errors() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_poll_interval_secs() -> f64 {
    1.0
}

fn default_page_load_timeout_ms() -> u64 {
    30_000
}

fn default_scroll() -> bool {
    true
}

fn default_scroll_script() -> String {
    crate::utils::constants::DEFAULT_SCROLL_SCRIPT.to_string()
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            disable_security: default_disable_security(),
            ignore_certificate_errors: default_ignore_certificate_errors(),
            chrome_executable: None,
            request_timeout_secs: default_request_timeout_secs(),
            window: WindowConfig::default(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            page_load_timeout_ms: default_page_load_timeout_ms(),
            scroll: default_scroll(),
            scroll_script: default_scroll_script(),
            early_exit: EarlyExitPolicy::default(),
            selection: SelectionPolicy::default(),
            event_kinds: EventKindFilter::default(),
            follow_iframe: None,
            probe_player: false,
        }
    }
}

/// Load config from config.yaml in package root
pub fn load_yaml_config() -> anyhow::Result<Config> {
    let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config.yaml");

    if config_path.exists() {
        load_config_from(&config_path)
    } else {
        Ok(Config::default())
    }
}

/// Load config from an explicit YAML file
pub fn load_config_from(path: &Path) -> anyhow::Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&contents)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    Ok(config)
}

pub use browser::{
    BrowserError, BrowserResult, BrowserWrapper, download_managed_browser,
    find_browser_executable, launch_browser,
};
pub use discovery::{
    DiscoveryError, DiscoveryReport, DiscoveryRequest, DiscoveryResult, discover_manifest,
    discover_with_manager, discover_with_session,
};
pub use manager::BrowserManager;
pub use session::{BrowserSession, ChromiumSession, NavigationOutcome, NetworkEvent, NetworkEventKind};

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert!(config.browser.headless);
        assert!(!config.browser.disable_security);
        assert_eq!(config.discovery.timeout_secs, 20);
        assert_eq!(config.discovery.poll_interval_secs, 1.0);
        assert_eq!(config.discovery.early_exit, EarlyExitPolicy::Collect { cap: 3 });
        assert_eq!(config.discovery.selection, SelectionPolicy::Longest);
        assert_eq!(config.discovery.event_kinds, EventKindFilter::Both);
        assert!(config.discovery.follow_iframe.is_none());
    }

    #[test]
    fn partial_yaml_overrides_only_given_fields() {
        let yaml = r##"
browser:
  headless: false
  window:
    width: 800
discovery:
  timeout_secs: 45
  early_exit:
    policy: first_match
  selection: prefer_master
  event_kinds: responses
  follow_iframe: "#iframe-holder iframe"
"##;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(!config.browser.headless);
        assert_eq!(config.browser.window.width, 800);
        assert_eq!(config.browser.window.height, 1080);
        assert_eq!(config.discovery.timeout_secs, 45);
        assert_eq!(config.discovery.early_exit, EarlyExitPolicy::FirstMatch);
        assert_eq!(config.discovery.selection, SelectionPolicy::PreferMaster);
        assert_eq!(config.discovery.event_kinds, EventKindFilter::Responses);
        assert_eq!(
            config.discovery.follow_iframe.as_deref(),
            Some("#iframe-holder iframe")
        );
        assert_eq!(config.discovery.page_load_timeout_ms, 30_000);
    }

    #[test]
    fn collect_cap_defaults_when_omitted() {
        let yaml = "discovery:\n  early_exit:\n    policy: collect\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.discovery.early_exit, EarlyExitPolicy::Collect { cap: 3 });
    }

    #[test]
    fn load_config_from_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "discovery:\n  poll_interval_secs: 0.5\n  probe_player: true").unwrap();

        let config = load_config_from(file.path()).unwrap();
        assert_eq!(config.discovery.poll_interval_secs, 0.5);
        assert!(config.discovery.probe_player);
    }

    #[test]
    fn load_config_from_missing_file_fails() {
        let err = load_config_from(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
