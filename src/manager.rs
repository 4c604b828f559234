//! Browser instance manager that leases discovery sessions
//!
//! One Chromium process is shared by every session the manager hands out;
//! each session gets its own page and network listeners, so concurrent
//! discovery runs never see each other's traffic.
//!
//! # Async Lock Requirements
//!
//! Must use `tokio::sync::Mutex`: launching, health checks and page creation
//! all `.await` while the lock is held.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::BrowserConfig;
use crate::browser::{BrowserError, BrowserResult, BrowserWrapper, create_blank_page, launch_browser};
use crate::session::ChromiumSession;

/// Manager for one lazily launched browser with health checking and crash recovery
///
/// - Launches Chrome on first use (~2-3s), reuses it afterwards
/// - Health-checks the browser on every access and relaunches after a crash
/// - Hands out one fresh page per discovery run via `open_session()`
/// - Cleans up the process and its profile directory in `shutdown()`
///
/// Construct one per process (or per worker) and pass it by reference.
pub struct BrowserManager {
    config: BrowserConfig,
    browser: Arc<Mutex<Option<BrowserWrapper>>>,
}

impl BrowserManager {
    /// Create a manager. The browser is launched on first `get_or_launch()`.
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            browser: Arc::new(Mutex::new(None)),
        }
    }

    /// Get or launch the shared browser instance with health checking and auto-recovery
    ///
    /// # Health Check and Recovery Flow
    /// 1. Lock browser mutex
    /// 2. If browser exists, check health via version() CDP command
    /// 3. If unhealthy, close crashed browser and remove from cache
    /// 4. If no browser or was unhealthy, launch new instance
    ///
    /// # Returns
    /// Arc to the browser Mutex - caller locks it to access BrowserWrapper
    pub async fn get_or_launch(&self) -> Result<Arc<Mutex<Option<BrowserWrapper>>>> {
        let mut guard = self.browser.lock().await;

        if let Some(wrapper) = guard.as_ref() {
            match wrapper.browser().version().await {
                Ok(_) => {
                    tracing::debug!("Browser health check passed, reusing existing browser");
                    drop(guard);
                    return Ok(self.browser.clone());
                }
                Err(e) => {
                    tracing::warn!("Browser health check failed: {}. Triggering recovery...", e);

                    if let Some(mut crashed_wrapper) = guard.take() {
                        // Best-effort cleanup (may fail if process already dead)
                        let _ = crashed_wrapper.browser_mut().close().await;
                        let _ = crashed_wrapper.browser_mut().wait().await;
                        crashed_wrapper.cleanup_temp_dir();
                    }

                    tracing::info!("Crashed browser cleaned up, launching new instance");
                }
            }
        }

        tracing::info!("Launching browser (first time or after recovery)");
        let (browser, handler, user_data_dir) = launch_browser(&self.config).await?;
        *guard = Some(BrowserWrapper::new(browser, handler, user_data_dir));
        drop(guard);

        Ok(self.browser.clone())
    }

    /// Lease a new discovery session: a blank page with network listeners
    ///
    /// The browser lock is held only while the page is created. The caller
    /// owns the session and must `close()` it when the run ends.
    pub async fn open_session(&self) -> BrowserResult<ChromiumSession> {
        let browser_arc = self
            .get_or_launch()
            .await
            .map_err(|e| BrowserError::LaunchFailed(format!("{e:#}")))?;

        let browser_guard = browser_arc.lock().await;
        let wrapper = browser_guard
            .as_ref()
            .ok_or_else(|| BrowserError::PageCreationFailed("Browser not available".into()))?;

        let page = create_blank_page(wrapper)
            .await
            .map_err(|e| BrowserError::PageCreationFailed(format!("{e:#}")))?;
        drop(browser_guard);

        let session = ChromiumSession::attach(page).await?;
        info!(session = %session.id(), "Opened discovery session");
        Ok(session)
    }

    /// Shutdown the browser if running
    ///
    /// Safe to call multiple times (subsequent calls are no-ops).
    ///
    /// Both `close()` and `wait()` are required: dropping `BrowserWrapper`
    /// only aborts the handler task and would leave a zombie Chrome process.
    pub async fn shutdown(&self) -> Result<()> {
        let mut guard = self.browser.lock().await;

        if let Some(mut wrapper) = guard.take() {
            info!("Shutting down browser");

            if let Err(e) = wrapper.browser_mut().close().await {
                tracing::warn!("Failed to close browser cleanly: {}", e);
            }

            if let Err(e) = wrapper.browser_mut().wait().await {
                tracing::warn!("Failed to wait for browser exit: {}", e);
            }

            wrapper.cleanup_temp_dir();
            drop(wrapper);
        }

        Ok(())
    }

    /// Check if browser is currently running
    pub async fn is_browser_running(&self) -> bool {
        self.browser.lock().await.is_some()
    }

    /// A browser is still held, so dropping now would skip `shutdown()`
    fn skipped_shutdown(&self) -> bool {
        match self.browser.try_lock() {
            Ok(guard) => guard.is_some(),
            // Someone is mid-launch or mid-shutdown
            Err(_) => true,
        }
    }
}

impl Drop for BrowserManager {
    fn drop(&mut self) {
        // Not a clean shutdown: only the handler task gets aborted
        if self.skipped_shutdown() {
            tracing::warn!(
                "BrowserManager dropped without shutdown(); Chrome may linger and its profile directory is orphaned"
            );
        }
    }
}
