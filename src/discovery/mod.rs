//! Manifest discovery loop
//!
//! Navigates a [`BrowserSession`] to the target page, then samples the
//! page's network log until the early-exit policy fires or the timeout
//! elapses, and finally picks one manifest URL out of everything that
//! passed the filter.
//!
//! # Usage
//! ```no_run
//! use hls_discovery::{BrowserManager, Config, DiscoveryRequest, discover_with_manager};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let manager = BrowserManager::new(config.browser.clone());
//!
//!     let request = DiscoveryRequest::new("https://player.example.com/e/abc123");
//!     let report = discover_with_manager(&manager, &request, &config.discovery).await?;
//!     println!("{:?}", report.result.selected());
//!
//!     manager.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod candidates;
mod filter;
mod policy;

pub use candidates::{CandidateSet, Offer};
pub use filter::{is_manifest_url, parse_absolute_url};
pub use policy::{EarlyExitPolicy, EventKindFilter, SelectionPolicy};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use crate::DiscoveryConfig;
use crate::browser::BrowserError;
use crate::manager::BrowserManager;
use crate::session::{BrowserSession, NavigationOutcome};
use crate::utils::constants::PLAYER_PROBE_SCRIPT;
use crate::utils::{
    validate_discovery_timeout, validate_page_load_timeout, validate_poll_interval,
    wait_for_element_src,
};

#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Rejected before any browser work happened
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The browser could not be launched or could not load the page
    #[error("Browser session error: {0}")]
    Session(#[from] BrowserError),
}

/// A page to search for an HLS manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryRequest {
    pub target_url: String,
    pub timeout_seconds: u64,
    pub poll_interval_seconds: f64,
}

/// Checked form of a request
#[derive(Debug, Clone)]
struct ValidatedRequest {
    url: Url,
    timeout: Duration,
    poll_interval: Duration,
}

impl DiscoveryRequest {
    /// Request with the default budget (20s, polling every second)
    pub fn new(target_url: impl Into<String>) -> Self {
        Self::from_config(target_url, &DiscoveryConfig::default())
    }

    /// Request using the timing defaults of `config`
    pub fn from_config(target_url: impl Into<String>, config: &DiscoveryConfig) -> Self {
        Self {
            target_url: target_url.into(),
            timeout_seconds: config.timeout_secs,
            poll_interval_seconds: config.poll_interval_secs,
        }
    }

    pub fn with_timeout_secs(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_poll_interval_secs(mut self, poll_interval_seconds: f64) -> Self {
        self.poll_interval_seconds = poll_interval_seconds;
        self
    }

    /// Check the request without touching a browser
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        self.validated().map(|_| ())
    }

    fn validated(&self) -> Result<ValidatedRequest, DiscoveryError> {
        let url = parse_absolute_url(self.target_url.trim()).ok_or_else(|| {
            DiscoveryError::InvalidInput(format!(
                "Target URL must be absolute with scheme and host: '{}'",
                self.target_url
            ))
        })?;

        Ok(ValidatedRequest {
            url,
            timeout: validate_discovery_timeout(self.timeout_seconds)?,
            poll_interval: validate_poll_interval(self.poll_interval_seconds)?,
        })
    }
}

/// Outcome of a discovery run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DiscoveryResult {
    Found {
        selected: String,
        alternatives: Vec<String>,
    },
    NotFound,
}

impl DiscoveryResult {
    pub fn selected(&self) -> Option<&str> {
        match self {
            Self::Found { selected, .. } => Some(selected),
            Self::NotFound => None,
        }
    }

    pub fn alternatives(&self) -> &[String] {
        match self {
            Self::Found { alternatives, .. } => alternatives,
            Self::NotFound => &[],
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

/// Result of a run together with when and how long it ran
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub target_url: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    /// Network log pulls performed
    pub polls: usize,
    /// Network events looked at, including rejected and duplicate ones
    pub events_inspected: usize,
    pub result: DiscoveryResult,
}

#[derive(Debug, Default, Clone, Copy)]
struct RunStats {
    polls: usize,
    events_inspected: usize,
}

/// Search the page behind `request` for an HLS manifest using `session`.
///
/// The session is navigated but not closed; the caller owns it.
///
/// # Errors
/// * `InvalidInput` - bad URL or timing values; `session` is never touched
/// * `Session` - the browser could not load the page at all
///
/// Running out of time is not an error: it yields `DiscoveryResult::NotFound`
/// unless something was collected before the deadline.
pub async fn discover_manifest<S>(
    session: &mut S,
    request: &DiscoveryRequest,
    config: &DiscoveryConfig,
) -> Result<DiscoveryResult, DiscoveryError>
where
    S: BrowserSession + ?Sized,
{
    run_discovery(session, request, config)
        .await
        .map(|(result, _)| result)
}

/// Run discovery on a session this call owns, closing it on every path.
pub async fn discover_with_session<S>(
    mut session: S,
    request: &DiscoveryRequest,
    config: &DiscoveryConfig,
) -> Result<DiscoveryReport, DiscoveryError>
where
    S: BrowserSession,
{
    let started_at = Utc::now();
    let clock = Instant::now();

    let outcome = run_discovery(&mut session, request, config).await;
    session.close().await;

    let (result, stats) = outcome?;
    Ok(DiscoveryReport {
        target_url: request.target_url.clone(),
        started_at,
        elapsed_ms: clock.elapsed().as_millis() as u64,
        polls: stats.polls,
        events_inspected: stats.events_inspected,
        result,
    })
}

/// Lease a fresh page from `manager`, run discovery on it and release it.
///
/// The request is validated before the browser is launched.
pub async fn discover_with_manager(
    manager: &BrowserManager,
    request: &DiscoveryRequest,
    config: &DiscoveryConfig,
) -> Result<DiscoveryReport, DiscoveryError> {
    request.validate()?;
    let session = manager.open_session().await?;
    discover_with_session(session, request, config).await
}

async fn run_discovery<S>(
    session: &mut S,
    request: &DiscoveryRequest,
    config: &DiscoveryConfig,
) -> Result<(DiscoveryResult, RunStats), DiscoveryError>
where
    S: BrowserSession + ?Sized,
{
    let request = request.validated()?;
    let page_load_timeout = validate_page_load_timeout(config.page_load_timeout_ms)?;

    info!(
        "Discovering manifest on {} (timeout {}s)",
        request.url,
        request.timeout.as_secs()
    );

    navigate(session, request.url.as_str(), page_load_timeout).await?;

    if let Some(selector) = config.follow_iframe.as_deref() {
        follow_iframe(session, selector, page_load_timeout).await?;
    }

    if config.scroll {
        session.run_script(&config.scroll_script).await;
    }

    debug!("Polling network log every {:?}", request.poll_interval);
    let mut candidates = CandidateSet::default();
    let mut stats = RunStats::default();
    let deadline = Instant::now() + request.timeout;

    loop {
        stats.polls += 1;

        // A failed or overdue sample is skipped; only the deadline ends the loop
        match tokio::time::timeout_at(deadline, session.poll_network_log()).await {
            Ok(Ok(batch)) => {
                for event in batch {
                    stats.events_inspected += 1;
                    if !config.event_kinds.accepts(event.kind) {
                        continue;
                    }
                    if candidates.offer(&event.url) == Offer::Accepted {
                        info!("Manifest candidate ({:?}): {}", event.kind, event.url);
                    }
                }
            }
            Ok(Err(e)) => debug!("Skipping network sample: {}", e),
            Err(_) => debug!("Network sample still pending at the deadline"),
        }

        if config.probe_player
            && tokio::time::timeout_at(deadline, probe_player(session, &mut candidates))
                .await
                .is_err()
        {
            debug!("Player probe still pending at the deadline");
        }

        if config.early_exit.should_stop(candidates.len()) {
            debug!(
                "Early exit after {} poll(s) with {} candidate(s)",
                stats.polls,
                candidates.len()
            );
            break;
        }

        let now = Instant::now();
        if now >= deadline {
            break;
        }
        tokio::time::sleep(request.poll_interval.min(deadline - now)).await;
    }

    let result = candidates.select(config.selection);
    match &result {
        DiscoveryResult::Found {
            selected,
            alternatives,
        } => info!(
            "Selected manifest {} ({} alternative(s))",
            selected,
            alternatives.len()
        ),
        DiscoveryResult::NotFound => info!("No manifest found on {}", request.url),
    }

    Ok((result, stats))
}

/// Navigate, treating an exceeded page-load timeout as success
async fn navigate<S>(session: &mut S, url: &str, timeout: Duration) -> Result<(), DiscoveryError>
where
    S: BrowserSession + ?Sized,
{
    match session.navigate(url, timeout).await? {
        NavigationOutcome::Loaded => debug!("Loaded {}", url),
        NavigationOutcome::TimedOut => {
            warn!("Page load timed out for {}; polling anyway", url)
        }
    }
    Ok(())
}

/// Open the `src` of the iframe matching `selector`, if it shows up in time
async fn follow_iframe<S>(
    session: &mut S,
    selector: &str,
    timeout: Duration,
) -> Result<(), DiscoveryError>
where
    S: BrowserSession + ?Sized,
{
    match wait_for_element_src(session, selector, timeout).await {
        Some(src) if parse_absolute_url(&src).is_some() => {
            info!("Following iframe '{}' to {}", selector, src);
            navigate(session, &src, timeout).await
        }
        Some(src) => {
            warn!("Ignoring iframe src that is not an absolute URL: {}", src);
            Ok(())
        }
        None => {
            warn!("No iframe matched '{}'; polling the original page", selector);
            Ok(())
        }
    }
}

/// Ask an embedded player for its source and offer it as a candidate
async fn probe_player<S>(session: &mut S, candidates: &mut CandidateSet)
where
    S: BrowserSession + ?Sized,
{
    match session.evaluate(PLAYER_PROBE_SCRIPT).await {
        Ok(serde_json::Value::String(url)) => {
            if candidates.offer(&url) == Offer::Accepted {
                info!("Manifest candidate (player): {}", url);
            }
        }
        Ok(_) => {}
        Err(e) => debug!("Player probe failed: {}", e),
    }
}
