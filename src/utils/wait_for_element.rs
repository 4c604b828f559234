//! Element polling utility for embedded players
//!
//! Provides wait_for_element_src() which polls for an element's `src` with
//! exponential backoff. Player pages often inject their iframe from
//! JavaScript after the initial load event fires.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::session::BrowserSession;

/// Wait for an element to appear and expose a non-empty `src` attribute
///
/// # Arguments
/// * `session` - Session whose current page is searched
/// * `selector` - CSS selector for the element
/// * `timeout` - Maximum time to wait for the element
///
/// # Returns
/// * `Some(src)` - The resolved `src` property of the element
/// * `None` - Timeout exceeded
///
/// # Polling Strategy
/// - Starts at 100ms intervals
/// - Doubles each retry (exponential backoff)
/// - Caps at 1 second maximum interval
pub async fn wait_for_element_src<S>(
    session: &mut S,
    selector: &str,
    timeout: Duration,
) -> Option<String>
where
    S: BrowserSession + ?Sized,
{
    let deadline = Instant::now() + timeout;
    let mut poll_interval = Duration::from_millis(100);
    let max_interval = Duration::from_secs(1);

    // Selector is embedded as a JSON string literal so quotes cannot break out
    let quoted = serde_json::to_string(selector).ok()?;
    let script = format!(
        "(() => {{ const el = document.querySelector({quoted}); return el && el.src ? String(el.src) : null; }})()"
    );

    loop {
        match tokio::time::timeout_at(deadline, session.evaluate(&script)).await {
            Ok(Ok(serde_json::Value::String(src))) if !src.is_empty() => return Some(src),
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!("Lookup of '{}' failed: {}", selector, e),
            Err(_) => {
                debug!("Lookup of '{}' still pending at the deadline", selector);
                return None;
            }
        }

        let now = Instant::now();
        if now >= deadline {
            debug!(
                "Element '{}' exposed no src within {}ms",
                selector,
                timeout.as_millis()
            );
            return None;
        }

        tokio::time::sleep(poll_interval.min(deadline - now)).await;

        poll_interval = (poll_interval * 2).min(max_interval);
    }
}
