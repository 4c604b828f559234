//! Chromium-backed browser session.
//!
//! Subscribes to `Network.requestWillBeSent` and `Network.responseReceived`
//! on a single page and buffers the URLs in a channel until the discovery
//! loop drains them.

use async_trait::async_trait;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use chromiumoxide_cdp::cdp::browser_protocol::network::{
    EventRequestWillBeSent, EventResponseReceived,
};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{BrowserSession, NavigationOutcome, NetworkEvent};
use crate::browser::{BrowserError, BrowserResult};

/// One page leased from a `BrowserManager`.
///
/// The page is closed by `close()`. Dropping an unclosed session aborts the
/// listener tasks and schedules a best-effort page close.
pub struct ChromiumSession {
    id: Uuid,
    page: Option<Page>,
    events: UnboundedReceiver<NetworkEvent>,
    listeners: Vec<JoinHandle<()>>,
}

impl ChromiumSession {
    /// Attach network listeners to `page` and wrap it in a session.
    ///
    /// Call this while the page is still on about:blank so the first request
    /// of the target page is not missed.
    pub async fn attach(page: Page) -> BrowserResult<Self> {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        let requests = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|e| BrowserError::NetworkLog(format!("requestWillBeSent listener: {e}")))?;
        let responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| BrowserError::NetworkLog(format!("responseReceived listener: {e}")))?;

        let request_task = spawn_forwarder(requests, tx.clone(), |event: &EventRequestWillBeSent| {
            NetworkEvent::request(event.request.url.clone())
        });
        let response_task = spawn_forwarder(responses, tx, |event: &EventResponseReceived| {
            NetworkEvent::response(event.response.url.clone())
        });

        debug!(session = %id, "Attached network listeners");

        Ok(Self {
            id,
            page: Some(page),
            events: rx,
            listeners: vec![request_task, response_task],
        })
    }

    /// Identifier used in log lines for this session
    pub fn id(&self) -> Uuid {
        self.id
    }

    fn page(&self) -> BrowserResult<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| BrowserError::PageCreationFailed("Session already closed".into()))
    }
}

/// Forward every event of `stream` into `tx` until either side goes away
fn spawn_forwarder<T, S, F>(mut stream: S, tx: UnboundedSender<NetworkEvent>, map: F) -> JoinHandle<()>
where
    T: Send + Sync + 'static,
    S: futures::Stream<Item = std::sync::Arc<T>> + Send + Unpin + 'static,
    F: Fn(&T) -> NetworkEvent + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(event) = stream.next().await {
            if tx.send(map(&event)).is_err() {
                break;
            }
        }
    })
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(
        &mut self,
        url: &str,
        page_load_timeout: Duration,
    ) -> BrowserResult<NavigationOutcome> {
        let page = self.page()?;
        info!(session = %self.id, "Navigating to {}", url);

        match tokio::time::timeout(page_load_timeout, page.goto(url)).await {
            Ok(Ok(_)) => Ok(NavigationOutcome::Loaded),
            Ok(Err(CdpError::Timeout)) | Err(_) => {
                warn!(
                    session = %self.id,
                    "Page load exceeded {}ms for {}; continuing with captured traffic",
                    page_load_timeout.as_millis(),
                    url
                );
                Ok(NavigationOutcome::TimedOut)
            }
            Ok(Err(e)) => Err(BrowserError::NavigationFailed(format!("{url}: {e}"))),
        }
    }

    async fn evaluate(&mut self, script: &str) -> BrowserResult<serde_json::Value> {
        let page = self.page()?;
        let result = page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::ScriptFailed(e.to_string()))?;

        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn poll_network_log(&mut self) -> BrowserResult<Vec<NetworkEvent>> {
        let mut batch = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => batch.push(event),
                Err(TryRecvError::Empty) => return Ok(batch),
                Err(TryRecvError::Disconnected) if batch.is_empty() => {
                    return Err(BrowserError::NetworkLog(
                        "network listeners stopped".to_string(),
                    ));
                }
                Err(TryRecvError::Disconnected) => return Ok(batch),
            }
        }
    }

    async fn close(&mut self) {
        for listener in self.listeners.drain(..) {
            listener.abort();
        }

        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                warn!(session = %self.id, "Failed to close page: {}", e);
            } else {
                debug!(session = %self.id, "Session page closed");
            }
        }
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        for listener in self.listeners.drain(..) {
            listener.abort();
        }

        if let Some(page) = self.page.take() {
            warn!(
                session = %self.id,
                "ChromiumSession dropped without close(); closing page in background"
            );
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    let _ = page.close().await;
                });
            }
        }
    }
}
