//! Browser session abstraction used by the discovery loop.
//!
//! A session is one page the discovery loop may drive: navigate it, run
//! scripts in it and drain the network events it has produced since the
//! last pull. `ChromiumSession` is the chromiumoxide implementation.

mod chromium;

pub use chromium::ChromiumSession;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::browser::BrowserResult;

/// Which side of an HTTP exchange the browser reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkEventKind {
    /// `Network.requestWillBeSent`
    RequestSent,
    /// `Network.responseReceived`
    ResponseReceived,
}

/// A single URL the page requested or received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEvent {
    pub kind: NetworkEventKind,
    pub url: String,
}

impl NetworkEvent {
    pub fn request(url: impl Into<String>) -> Self {
        Self {
            kind: NetworkEventKind::RequestSent,
            url: url.into(),
        }
    }

    pub fn response(url: impl Into<String>) -> Self {
        Self {
            kind: NetworkEventKind::ResponseReceived,
            url: url.into(),
        }
    }
}

/// Result of a navigation that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The page finished loading within the page-load timeout.
    Loaded,
    /// The page-load timeout elapsed. The page keeps loading and its
    /// traffic is still captured, so callers may carry on.
    TimedOut,
}

/// Capability the discovery loop needs from a browser.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate the session's page to `url`.
    ///
    /// Hard failures (crashed browser, refused navigation) are errors;
    /// running out of `page_load_timeout` is `NavigationOutcome::TimedOut`.
    async fn navigate(
        &mut self,
        url: &str,
        page_load_timeout: Duration,
    ) -> BrowserResult<NavigationOutcome>;

    /// Evaluate a JavaScript expression and return its JSON value
    /// (`Null` for `undefined`).
    async fn evaluate(&mut self, script: &str) -> BrowserResult<serde_json::Value>;

    /// Best-effort script execution; the result and any error are dropped.
    async fn run_script(&mut self, script: &str) {
        if let Err(e) = self.evaluate(script).await {
            debug!("Ignoring script failure: {}", e);
        }
    }

    /// Network events observed since the previous call. May be empty.
    async fn poll_network_log(&mut self) -> BrowserResult<Vec<NetworkEvent>>;

    /// Release the page and its listeners. Safe to call more than once.
    async fn close(&mut self);
}
